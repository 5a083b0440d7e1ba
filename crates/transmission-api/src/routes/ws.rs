//! WebSocket endpoint.
//!
//! Each socket gets a fresh connection id, which is the caller identity for
//! every RPC it sends. Server pushes and RPC replies share one outbound
//! channel; each inbound call runs in its own task so a delayed relay does
//! not hold up the caller's other calls.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use tracing::{debug, info};
use transmission_core::ids::ParticipantId;
use uuid::Uuid;

use crate::rpc;
use crate::state::AppState;

/// GET /ws
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let connection = ParticipantId::new(Uuid::new_v4().to_string());
    let mut outbound = state.hub.connect(&connection);
    info!(%connection, "WebSocket client connected");

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    debug!(%connection, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let state = state.clone();
                        let caller = connection.clone();
                        tokio::spawn(async move {
                            let reply = rpc::handle_frame(&state.registry, &caller, text.as_str()).await;
                            if !state.hub.send_frame(&caller, reply) {
                                debug!(%caller, "dropping reply for closed connection");
                            }
                        });
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%connection, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%connection, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%connection, "WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }

    state.hub.disconnect(&connection);
    info!(%connection, "WebSocket client gone");
}

/// Returns the WebSocket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}
