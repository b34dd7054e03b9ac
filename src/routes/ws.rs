//! routes/ws.rs — per-room event push channel.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::{broker::SessionBroker, error::CastResult, state::RoomEvent};

pub fn router() -> Router {
    Router::new().route("/rooms/:code", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Extension(broker): Extension<SessionBroker>,
) -> CastResult<impl IntoResponse> {
    // Subscribe before upgrading so an unknown room is a plain 404.
    let rx = broker.subscribe(&code).await?;
    Ok(ws.on_upgrade(move |sock| room_ws(sock, rx)))
}

/* ---------------- per subscriber ---------------- */
async fn room_ws(sock: WebSocket, mut rx: Receiver<RoomEvent>) {
    let (mut sink, mut stream) = sock.split();
    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Ok(ev) => {
                    let done = ev == RoomEvent::ReceiverDisconnected;
                    let frame = match serde_json::to_string(&ev) {
                        Ok(f) => f,
                        Err(_) => continue,
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            msg = stream.next() => match msg {
                // Subscribers only listen; anything they send is ignored.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    let _ = sink.close().await;
}
