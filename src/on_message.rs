use std::sync::Arc;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
};

use crate::{connection::Connection, error::Error, message::Message};

/// Drains `conn` on a spawned task, handing every message to `f`.
///
/// The task ends once the connection reports itself closed. Any other
/// read error also ends the task after being logged, since a drain loop
/// has nothing it can do about a failing stream.
///
/// Pings answered, pongs settled and close frames applied by
/// [`Connection::read`] all happen on this task, which makes it a natural
/// companion to [`Connection::ping`](Connection::ping) from elsewhere.
/// The returned handle can be awaited to join the drain, or dropped to
/// let it run out on its own.
pub fn on_message<S, F>(conn: Arc<Connection<S>>, mut f: F) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    F: FnMut(Message) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match conn.read().await {
                Ok(message) => f(message),
                Err(Error::ConnectionClosed) => return,
                Err(error) => {
                    tracing::error!(%error, "reading for the message callback failed");

                    return;
                }
            }
        }
    })
}
