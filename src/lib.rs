//! Server-side `websockets` on top of `tokio` and `hyper`: an http upgrade acceptor and a concurrency-safe connection engine with ping/pong liveness.

#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Example
//!
//! Accept upgrades from a hyper http/1.1 server and echo every text and
//! binary message back:
//!
//! ```no_run
//! use hyper::{server::conn::http1, service::service_fn};
//! use hyper_util::rt::TokioIo;
//! use websockd::{accept, error::Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!
//!     loop {
//!         let (stream, _) = listener.accept().await?;
//!
//!         tokio::spawn(async move {
//!             let service = service_fn(|mut request| async move {
//!                 let (response, upgrade) = accept(&mut request)?;
//!
//!                 tokio::spawn(async move {
//!                     let Ok(conn) = upgrade.await else { return };
//!
//!                     while let Ok(message) = conn.read().await {
//!                         if message.is_text() || message.is_binary() {
//!                             if conn.write(message).await.is_err() {
//!                                 break;
//!                             }
//!                         }
//!                     }
//!                 });
//!
//!                 Ok::<_, Error>(response)
//!             });
//!
//!             let _ = http1::Builder::new()
//!                 .serve_connection(TokioIo::new(stream), service)
//!                 .with_upgrades()
//!                 .await;
//!         });
//!     }
//! }
//! ```
//!
//! # Concurrency
//!
//! A [`Connection`] is driven through `&self`: share it behind an
//! [`Arc`](std::sync::Arc) and call [`read`](Connection::read),
//! [`write`](Connection::write), [`ping`](Connection::ping) and
//! [`close`](Connection::close) from as many tasks as needed. Reads are
//! serialized, writes are serialized, and reads never block writes.
//!
//! # Liveness
//!
//! The connection manages itself as long as something reads from it:
//! inbound pings are answered with a pong, inbound close frames mark the
//! connection as closed, and inbound pongs resolve [`Connection::ping`]
//! calls waiting on the peer. [`on_message`] spawns such a read loop and
//! hands the messages to a callback.
//!
//! Frames are never fragmented and extensions are never negotiated; a
//! frame that announces either is rejected as malformed.

mod codec;

mod connection;
pub use connection::{Connection, DEFAULT_PING_TIMEOUT};

pub mod error;

mod handshake;
pub use handshake::{UpgradeFut, accept};

mod message;
pub use message::Message;

mod on_message;
pub use on_message::on_message;

mod opcode;
