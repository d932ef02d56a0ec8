//! Shared reconnect-loop plumbing for the five stream workers.
//!
//! Each worker owns its own subscription frame and message dispatch, but all
//! of them reconnect forever on error, send a ping at a fixed cadence to keep
//! the server-side connection alive, and stop cooperatively when cancelled.
//! The loop shape mirrors the teacher's websocket RFQ client.

pub mod limits;
pub mod marginal;
pub mod market;
pub mod orders;
pub mod portfolio;

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::error::IngestError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PING_INTERVAL: Duration = Duration::from_secs(20);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Obtains a fresh access token, opens an authenticated websocket to `url`
/// and invokes `handler` with the established socket, reconnecting after
/// `RECONNECT_BACKOFF` on any error, forever, until `cancel` fires.
/// `handler` owns the subscribe-then-dispatch logic for its stream.
pub async fn run_reconnect_loop<F, Fut>(
    label: &'static str,
    url: String,
    auth: Arc<Authenticator>,
    cancel: CancellationToken,
    mut handler: F,
) where
    F: FnMut(WsStream) -> Fut,
    Fut: std::future::Future<Output = Result<(), IngestError>>,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        info!(stream = label, "connecting");
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            res = connect_authenticated(&url, &auth) => res,
        };

        match connected {
            Ok(ws) => {
                info!(stream = label, "connected");
                if let Err(e) = handler(ws).await {
                    warn!(stream = label, error = %e, "stream handler exited");
                }
            }
            Err(e) => {
                warn!(stream = label, error = %e, "connection failed");
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
        }
    }
    info!(stream = label, "stream worker stopped");
}

async fn connect_authenticated(url: &str, auth: &Authenticator) -> Result<WsStream, IngestError> {
    let token = auth.get_access_token().await?;

    let mut request = url
        .into_client_request()
        .map_err(|e| IngestError::TransientStream(e.to_string()))?;
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| IngestError::TransientStream(e.to_string()))?,
    );

    let (ws, _) = connect_async(request)
        .await
        .map_err(|e| IngestError::TransientStream(e.to_string()))?;
    Ok(ws)
}

pub type WsWrite = futures::stream::SplitSink<WsStream, Message>;
pub type WsRead = futures::stream::SplitStream<WsStream>;

/// Runs a read loop over an already-split socket half, dispatching text
/// frames to `on_message` and sending a ping every `PING_INTERVAL`. Returns
/// when the socket closes, a read error occurs, or `cancel` fires. Callers
/// split the socket themselves first so they can send a subscribe frame
/// over `write` before entering this loop.
pub async fn pump_messages<F, Fut>(
    write: &mut WsWrite,
    read: &mut WsRead,
    cancel: &CancellationToken,
    mut on_message: F,
) -> Result<(), IngestError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ping_tick = tokio::time::interval(PING_INTERVAL);
    ping_tick.tick().await; // first tick fires immediately; discard it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ping_tick.tick() => {
                write
                    .send(Message::Ping(Vec::new().into()))
                    .await
                    .map_err(|e| IngestError::TransientStream(e.to_string()))?;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => on_message(text.to_string()).await,
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(IngestError::TransientStream("socket closed".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(IngestError::TransientStream(e.to_string()));
                    }
                }
            }
        }
    }
}

/// Sends a single JSON text frame, used by each worker to issue its initial
/// subscription message right after connecting.
pub async fn send_json(
    write: &mut (impl futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    value: &serde_json::Value,
) -> Result<(), IngestError> {
    let text = serde_json::to_string(value)?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| IngestError::TransientStream(e.to_string()))?;
    Ok(())
}
