//! A hex echo server.
//!
//! Every text or binary payload is echoed back hex encoded, followed by a
//! ping to check the peer is still answering. Connect with any websocket
//! client, for example:
//!
//! ```sh
//! websocat ws://127.0.0.1:8000
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::{body::Incoming, server::conn::http1, service::service_fn, upgrade::Upgraded};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use websockd::{Connection, Message, accept, error::Error, on_message};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let listener = TcpListener::bind("127.0.0.1:8000").await?;
    tracing::info!("Server started, listening on 127.0.0.1:8000");

    loop {
        let (stream, peer) = listener.accept().await?;

        tokio::spawn(async move {
            let served = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service_fn(upgrade))
                .with_upgrades()
                .await;

            if let Err(error) = served {
                tracing::error!(%peer, %error, "Error serving connection");
            }
        });
    }
}

async fn upgrade(
    mut request: hyper::Request<Incoming>,
) -> Result<hyper::Response<Empty<Bytes>>, Error> {
    let (response, upgrade) = accept(&mut request)?;

    tokio::spawn(async move {
        match upgrade.await {
            Ok(conn) => echo(Arc::new(conn)).await,
            Err(error) => tracing::error!(%error, "Error upgrading connection"),
        }
    });

    Ok(response)
}

async fn echo(conn: Arc<Connection<TokioIo<Upgraded>>>) {
    // The drain task reads everything the peer sends: data frames land in
    // the callback below, while pings are answered and pongs are settled
    // on the way. That concurrent reading is what lets the ping after
    // each echo resolve as soon as the pong comes back.
    let drain = on_message(Arc::clone(&conn), {
        let conn = Arc::clone(&conn);

        move |message| {
            let payload = match &message {
                Message::Text(payload) | Message::Binary(payload) => payload.clone(),
                _ => return,
            };

            let conn = Arc::clone(&conn);

            tokio::spawn(async move {
                let reply = Message::Text(Bytes::from(hex(&payload)));

                if let Err(error) = conn.write(reply).await {
                    tracing::error!(%error, "Error echoing message");

                    return;
                }

                match conn.ping().await {
                    Ok(alive) => tracing::info!(alive, "Ping round trip"),
                    Err(error) => tracing::error!(%error, "Error pinging peer"),
                }
            });
        }
    });

    let _ = drain.await;

    tracing::info!("Connection finished");
}

fn hex(payload: &[u8]) -> String {
    payload.iter().map(|byte| format!("{byte:02x}")).collect()
}
