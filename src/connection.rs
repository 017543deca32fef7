use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{self, Effect},
    error::Error,
    message::Message,
};

/// How long [`Connection::ping`] waits for a pong before giving up.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// A server-side websocket connection over an established stream.
///
/// All methods take `&self` and are safe to call from concurrent tasks:
/// reads are serialized against each other, writes are serialized against
/// each other, and a read may proceed while a write is in flight. A
/// connection is usually shared behind an [`Arc`](std::sync::Arc), with
/// one task draining [`read`](Self::read) while others call
/// [`write`](Self::write) or [`ping`](Self::ping).
pub struct Connection<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
    ping: Mutex<PingSlot>,
    shutdown: CancellationToken,
}

/// The at-most-one outstanding liveness ping.
///
/// Set by whichever ping call finds it empty, cleared by pong settlement
/// or by a waiter that saw its own round trip resolve. The generation
/// counter keeps a late waiter from clearing a newer ping's entry.
#[derive(Debug)]
struct PingSlot {
    pending: Option<PendingPing>,
    generation: u64,
}

#[derive(Debug, Clone)]
struct PendingPing {
    token: CancellationToken,
    deadline: Option<Instant>,
    generation: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wraps an established bidirectional stream.
    ///
    /// The stream is expected to be past its handshake and must not be
    /// used by anything else from this point on.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            ping: Mutex::new(PingSlot {
                pending: None,
                generation: 0,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    /// Reads the next message from the connection.
    ///
    /// Control frames are handled before they are returned: a ping is
    /// answered with an empty pong (a failed reply is logged, not
    /// surfaced), a pong settles an outstanding [`ping`](Self::ping), and
    /// a close marks the connection as closed. The message itself is
    /// still handed to the caller in all three cases, so a close frame
    /// comes back as one last successful read.
    ///
    /// Fails with [`Error::ConnectionClosed`] once this side is closed,
    /// without touching the stream.
    pub async fn read(&self) -> Result<Message, Error> {
        let mut reader = self.reader.lock().await;

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let decoded = codec::decode(&mut *reader).await?;

        // Still under the read lock, so the effect lands before any
        // later frame is looked at.
        if let Some(effect) = decoded.effect {
            self.apply(effect).await;
        }

        Ok(decoded.message)
    }

    /// Writes a message to the connection as a single frame.
    ///
    /// Fails with [`Error::ConnectionClosed`] once this side is closed,
    /// without touching the stream.
    pub async fn write(&self, message: Message) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let frame = codec::encode(&message);

        writer
            .write_all(&frame)
            .await
            .map_err(Error::ConnectionWrite)
    }

    /// Marks the connection as closed and shuts the stream down.
    ///
    /// Waits for both the read and the write lock, so no in-flight frame
    /// operation races the shutdown. Afterwards every read and write on
    /// this connection fails fast with [`Error::ConnectionClosed`].
    pub async fn close(&self) -> Result<(), Error> {
        let _reader = self.reader.lock().await;
        let mut writer = self.writer.lock().await;

        self.close_locked(&mut writer).await
    }

    /// Whether this side has marked the connection as closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes a liveness ping and waits for the pong.
    ///
    /// Resolves to `Ok(true)` once a concurrent [`read`](Self::read)
    /// decodes a pong, `Ok(false)` if none arrives within
    /// [`DEFAULT_PING_TIMEOUT`], and an error only if the ping frame
    /// itself could not be written. While a ping is outstanding, further
    /// calls write nothing and wait on the same round trip.
    ///
    /// Pongs are observed by whatever task is reading, so a ping on a
    /// connection nobody reads from can only resolve at the deadline.
    pub async fn ping(&self) -> Result<bool, Error> {
        self.ping_timeout(DEFAULT_PING_TIMEOUT).await
    }

    /// Like [`ping`](Self::ping) with an explicit timeout.
    pub async fn ping_timeout(&self, timeout: Duration) -> Result<bool, Error> {
        self.ping_inner(Some(Instant::now() + timeout), None).await
    }

    /// Like [`ping`](Self::ping) but bounded by `cancel` instead of a
    /// deadline.
    ///
    /// Cancelling the token settles the wait as `Ok(true)`, the same way
    /// closing the connection settles it. A caller that needs a verdict
    /// on top of cancellation should prefer [`ping_timeout`](Self::ping_timeout).
    pub async fn ping_with(&self, cancel: &CancellationToken) -> Result<bool, Error> {
        self.ping_inner(None, Some(cancel)).await
    }

    async fn ping_inner(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, Error> {
        let (pending, fresh) = {
            let mut slot = self.ping.lock().await;

            match slot.pending.clone() {
                Some(pending) => (pending, false),
                None => {
                    slot.generation += 1;

                    let token = match cancel {
                        Some(cancel) => cancel.child_token(),
                        None => self.shutdown.child_token(),
                    };

                    let pending = PendingPing {
                        token,
                        deadline,
                        generation: slot.generation,
                    };

                    slot.pending = Some(pending.clone());

                    (pending, true)
                }
            }
        };

        if fresh {
            if let Err(error) = self.write(Message::Ping(Bytes::new())).await {
                self.clear_ping(pending.generation).await;

                return Err(error);
            }
        }

        let received = match pending.deadline {
            Some(deadline) => tokio::select! {
                _ = pending.token.cancelled() => true,
                _ = self.shutdown.cancelled() => true,
                _ = tokio::time::sleep_until(deadline) => false,
            },
            None => tokio::select! {
                _ = pending.token.cancelled() => true,
                _ = self.shutdown.cancelled() => true,
            },
        };

        self.clear_ping(pending.generation).await;

        Ok(received)
    }

    async fn clear_ping(&self, generation: u64) {
        let mut slot = self.ping.lock().await;

        if slot
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
        {
            slot.pending = None;
        }
    }

    async fn apply(&self, effect: Effect) {
        match effect {
            Effect::ReplyPong => {
                // Reply payload is always empty, whatever the ping carried.
                if let Err(error) = self.write(Message::Pong(Bytes::new())).await {
                    tracing::error!(%error, "failed to write pong in response to a ping");
                }
            }
            Effect::SettlePing => {
                let mut slot = self.ping.lock().await;

                if let Some(pending) = slot.pending.take() {
                    pending.token.cancel();
                }
            }
            Effect::Shutdown => {
                let mut writer = self.writer.lock().await;

                if let Err(error) = self.close_locked(&mut writer).await {
                    tracing::debug!(%error, "shutting down after a close frame failed");
                }
            }
        }
    }

    async fn close_locked(&self, writer: &mut WriteHalf<S>) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();

        writer.shutdown().await.map_err(Error::ConnectionWrite)
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
