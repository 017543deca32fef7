//! Everything that can fail while accepting or driving a connection.

use std::io;

/// The closed set of failures surfaced by this crate.
///
/// Callers are expected to match on the variant to decide how to react;
/// the set is deliberately small and never grows behind a catch-all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request does not ask for a websocket upgrade.
    #[error("Request is not a websocket upgrade")]
    RequestNotWebsocket,
    /// The request asks for a websocket version other than 13.
    #[error("Websocket version is not supported")]
    VersionNotSupported,
    /// The request carries no usable `Sec-WebSocket-Key`.
    #[error("Sec-WebSocket-Key is missing or empty")]
    KeyNotProvided,
    /// The http layer cannot or did not hand over the raw connection.
    #[error("Taking over the http connection failed")]
    HijackFailed(#[source] Option<hyper::Error>),
    /// Reading from the underlying stream failed.
    #[error("Reading from the connection failed")]
    ConnectionRead(#[source] io::Error),
    /// Writing to the underlying stream failed.
    #[error("Writing to the connection failed")]
    ConnectionWrite(#[source] io::Error),
    /// This side already marked the connection as closed.
    #[error("Connection is closed")]
    ConnectionClosed,
    /// The peer sent bytes that do not form a supported frame.
    #[error("Malformed frame")]
    MalformedFrame,
}
