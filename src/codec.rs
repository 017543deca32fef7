use std::io::ErrorKind;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{error::Error, message::Message, opcode::OpCode};

const FIN: u8 = 0b10000000;
const RSV: u8 = 0b01110000;
const OPCODE: u8 = 0b00001111;
const MASKED: u8 = 0b10000000;
const LENGTH: u8 = 0b01111111;

/// Side effect requested by a decoded frame.
///
/// The decoder never touches connection state itself. It reports what the
/// frame asks for and the connection applies it after the frame is fully
/// consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// An inbound ping wants an empty pong written back.
    ReplyPong,
    /// An inbound pong settles the outstanding liveness ping, if any.
    SettlePing,
    /// An inbound close frame shuts the connection down.
    Shutdown,
}

/// A decoded frame: the message itself plus the side effect it requests.
#[derive(Debug)]
pub(crate) struct Decoded {
    pub message: Message,
    pub effect: Option<Effect>,
}

/// Reads exactly one frame from `reader`.
///
/// Runs under the connection's read lock, so every await below suspends on
/// the same stream without interleaving with other readers.
pub(crate) async fn decode<R>(reader: &mut R) -> Result<Decoded, Error>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0_u8; 2];

    reader
        .read_exact(&mut header)
        .await
        .map_err(|error| match error.kind() {
            // Fewer than two bytes available, eof included.
            ErrorKind::UnexpectedEof => Error::MalformedFrame,
            _ => Error::ConnectionRead(error),
        })?;

    // Fragmentation is not supported, every frame must be final.
    if header[0] & FIN == 0 {
        return Err(Error::MalformedFrame);
    }

    // Reserved bits belong to extensions, which are never negotiated.
    if header[0] & RSV != 0 {
        return Err(Error::MalformedFrame);
    }

    let opcode = OpCode::try_from(header[0] & OPCODE)?;
    let masked = header[1] & MASKED != 0;

    let payload_len = match header[1] & LENGTH {
        126 => {
            let mut extended = [0_u8; 2];

            reader
                .read_exact(&mut extended)
                .await
                .map_err(Error::ConnectionRead)?;

            u16::from_be_bytes(extended) as usize
        }
        127 => {
            let mut extended = [0_u8; 8];

            reader
                .read_exact(&mut extended)
                .await
                .map_err(Error::ConnectionRead)?;

            u64::from_be_bytes(extended) as usize
        }
        length => length as usize,
    };

    let mask = if masked {
        let mut key = [0_u8; 4];

        reader
            .read_exact(&mut key)
            .await
            .map_err(Error::ConnectionRead)?;

        Some(key)
    } else {
        None
    };

    let mut payload = vec![0_u8; payload_len];

    reader
        .read_exact(&mut payload)
        .await
        .map_err(Error::ConnectionRead)?;

    if let Some(key) = mask {
        unmask(&mut payload, key);
    }

    let effect = match opcode {
        OpCode::Close => Some(Effect::Shutdown),
        OpCode::Ping => Some(Effect::ReplyPong),
        OpCode::Pong => Some(Effect::SettlePing),
        OpCode::Text | OpCode::Binary => None,
    };

    Ok(Decoded {
        message: Message::from_parts(opcode, Bytes::from(payload)),
        effect,
    })
}

/// Assembles one outbound frame.
///
/// Server frames are never masked, so the payload is appended as is.
pub(crate) fn encode(message: &Message) -> BytesMut {
    let payload = message.payload();

    let mut frame = BytesMut::with_capacity(10 + payload.len());

    frame.put_u8(FIN | message.opcode() as u8);

    let length = payload.len();

    if length < 126 {
        frame.put_u8(length as u8);
    } else if length < 65536 {
        frame.put_u8(126);
        frame.put_u16(length as u16);
    } else {
        frame.put_u8(127);
        frame.put_u64(length as u64);
    }

    frame.extend_from_slice(payload);

    frame
}

fn unmask(payload: &mut [u8], key: [u8; 4]) {
    for (index, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[index % 4];
    }
}
