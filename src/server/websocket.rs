//! WebSocket subscriber endpoint
//!
//! A new subscriber joins the broadcast set and receives the current status
//! and usage snapshot ahead of any live event. A reader task watches the
//! inbound half and unsubscribes once the client goes away.

use futures::StreamExt;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use super::routes::{error_response, Body};
use super::AppState;
use crate::broadcast::events::TelemetryEvent;
use crate::broadcast::sink::WsSink;

fn header_contains(req: &Request<Incoming>, name: hyper::header::HeaderName, token: &str) -> bool {
    req.headers()
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

/// Answer the upgrade handshake and spawn the subscriber session
pub fn upgrade(mut req: Request<Incoming>, state: AppState) -> Response<Body> {
    if !header_contains(&req, UPGRADE, "websocket") || !header_contains(&req, CONNECTION, "upgrade") {
        return error_response(StatusCode::BAD_REQUEST, "Expected WebSocket upgrade");
    }

    let accept = match req
        .headers()
        .get(SEC_WEBSOCKET_KEY)
        .map(|key| derive_accept_key(key.as_bytes()))
        .and_then(|accept| HeaderValue::from_str(&accept).ok())
    {
        Some(accept) => accept,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing Sec-WebSocket-Key"),
    };

    let on_upgrade = hyper::upgrade::on(&mut req);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let ws = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
                serve_subscriber(ws, state).await;
            }
            Err(e) => warn!("WebSocket upgrade failed: {}", e),
        }
    });

    let mut response = Response::new(Body::default());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
    response
}

/// Run one subscriber until it disconnects or is evicted
pub async fn serve_subscriber<S>(ws: WebSocketStream<S>, state: AppState)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, mut inbound) = ws.split();

    let store = &state.store;
    let snapshot = || -> Vec<TelemetryEvent> {
        let (status, usage) = store.current();
        status
            .map(TelemetryEvent::Status)
            .into_iter()
            .chain(usage.map(TelemetryEvent::DataUsage))
            .collect()
    };
    let id = match state
        .broadcaster
        .subscribe_with_catch_up(Box::new(WsSink::new(sink)), snapshot)
        .await
    {
        Some(id) => id,
        None => {
            debug!("Subscriber left before snapshot was delivered");
            return;
        }
    };

    // Inbound traffic is ignored; only its end matters
    while let Some(message) = inbound.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.broadcaster.unsubscribe(id).await;
}
