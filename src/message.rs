use bytes::Bytes;

use crate::opcode::OpCode;

/// A websocket message.
///
/// Payloads are [`Bytes`] handles, so cloning a message is cheap and never
/// copies payload data. Text payloads are carried as raw bytes and are not
/// validated as UTF-8 by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message.
    Text(Bytes),
    /// A binary message.
    Binary(Bytes),
    /// A close message.
    ///
    /// Receiving one also marks the connection as closed, see
    /// [`Connection::read`](crate::Connection::read).
    Close(Bytes),
    /// A ping message.
    ///
    /// Inbound pings are answered with an empty pong automatically.
    Ping(Bytes),
    /// A pong message, usually answering a ping.
    Pong(Bytes),
}

impl Message {
    /// Indicates whether a message is a text message.
    pub fn is_text(&self) -> bool {
        matches!(*self, Message::Text(_))
    }

    /// Indicates whether a message is a binary message.
    pub fn is_binary(&self) -> bool {
        matches!(*self, Message::Binary(_))
    }

    /// Indicates whether a message is a close message.
    pub fn is_close(&self) -> bool {
        matches!(*self, Message::Close(_))
    }

    /// Indicates whether a message is a ping message.
    pub fn is_ping(&self) -> bool {
        matches!(*self, Message::Ping(_))
    }

    /// Indicates whether a message is a pong message.
    pub fn is_pong(&self) -> bool {
        matches!(*self, Message::Pong(_))
    }

    /// The payload bytes of the message.
    pub fn payload(&self) -> &Bytes {
        match self {
            Message::Text(payload)
            | Message::Binary(payload)
            | Message::Close(payload)
            | Message::Ping(payload)
            | Message::Pong(payload) => payload,
        }
    }

    /// Get the length of the message payload.
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Returns true if the message has no payload.
    /// For example, if the other side of the connection sent an empty string.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Close(_) => OpCode::Close,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
        }
    }

    pub(crate) fn from_parts(opcode: OpCode, payload: Bytes) -> Self {
        match opcode {
            OpCode::Text => Message::Text(payload),
            OpCode::Binary => Message::Binary(payload),
            OpCode::Close => Message::Close(payload),
            OpCode::Ping => Message::Ping(payload),
            OpCode::Pong => Message::Pong(payload),
        }
    }
}
