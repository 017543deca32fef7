use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode, header};
use http_body_util::Empty;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};

use crate::{connection::Connection, error::Error};

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Validates a websocket upgrade request and prepares the switch.
///
/// On success returns the `101 Switching Protocols` response to hand back
/// to hyper, plus a future resolving to the upgraded [`Connection`] once
/// that response went out.
///
/// Validation order, first failure wins: the `Upgrade` header must equal
/// `websocket`, the `Connection` header must list the `upgrade` token,
/// `Sec-WebSocket-Version` must be `13` and a non-empty
/// `Sec-WebSocket-Key` must be present. The request must also still hold
/// its upgrade capability, [`Error::HijackFailed`] otherwise.
pub fn accept<B>(request: &mut Request<B>) -> Result<(Response<Empty<Bytes>>, UpgradeFut), Error> {
    let accept = {
        let headers = request.headers();

        if headers.get(header::UPGRADE).map(HeaderValue::as_bytes) != Some(b"websocket") {
            return Err(Error::RequestNotWebsocket);
        }

        if !connection_upgrades(headers.get(header::CONNECTION)) {
            return Err(Error::RequestNotWebsocket);
        }

        if headers
            .get(header::SEC_WEBSOCKET_VERSION)
            .map(HeaderValue::as_bytes)
            != Some(b"13")
        {
            return Err(Error::VersionNotSupported);
        }

        let key = headers
            .get(header::SEC_WEBSOCKET_KEY)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(Error::KeyNotProvided)?;

        sec_accept(key.as_bytes())
    };

    let on_upgrade = request
        .extensions_mut()
        .remove::<OnUpgrade>()
        .ok_or(Error::HijackFailed(None))?;

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .header(header::SEC_WEBSOCKET_ACCEPT, &accept[..])
        .body(Empty::new())
        .expect("Bug: switching protocols response must build");

    Ok((response, UpgradeFut { on_upgrade }))
}

/// `Connection` is a comma separated token list per RFC 9110. Real
/// clients send variants like `keep-alive, Upgrade`, so the `upgrade`
/// token is matched case-insensitively anywhere in the list.
fn connection_upgrades(value: Option<&HeaderValue>) -> bool {
    value.and_then(|value| value.to_str().ok()).is_some_and(|value| {
        value
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    })
}

fn sec_accept(key: &[u8]) -> [u8; 28] {
    let mut sha1 = Sha1::new();

    sha1.update(key);
    sha1.update(GUID);

    let hash = sha1.finalize();

    // Base64 of the 20 byte digest is always 28 bytes.
    let mut encoded: [u8; 28] = [0; 28];

    general_purpose::STANDARD
        .encode_slice(hash, &mut encoded)
        .expect("Bug: sec_accept encoding failed");

    encoded
}

/// Resolves to the upgraded [`Connection`] once the `101` response has
/// been sent.
///
/// Returned by [`accept`]. Hyper finishes the protocol switch in the
/// background after the response goes out; polling this future yields the
/// connection over the raw stream, or [`Error::HijackFailed`] if the
/// switch fell through.
#[derive(Debug)]
pub struct UpgradeFut {
    on_upgrade: OnUpgrade,
}

impl Future for UpgradeFut {
    type Output = Result<Connection<TokioIo<Upgraded>>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match Pin::new(&mut this.on_upgrade).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(upgraded)) => Poll::Ready(Ok(Connection::new(TokioIo::new(upgraded)))),
            Poll::Ready(Err(error)) => Poll::Ready(Err(Error::HijackFailed(Some(error)))),
        }
    }
}
