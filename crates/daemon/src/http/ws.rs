// Live channel: one notify-only WebSocket per browser tab.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::AppState;
use crate::hub::{Frame, SessionId};

/// Live frames are small JSON notifications; client frames are never parsed.
const MAX_FRAME_BYTES: usize = 64 * 1024;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let hub = state.hub.clone();
    let shutdown = state.shutdown.subscribe();
    ws.max_frame_size(MAX_FRAME_BYTES).on_upgrade(move |socket| async move {
        let (session_id, outbound) = hub.register().await;
        info!(session_id = %session_id, "live session opened");
        handle_socket(socket, session_id, outbound, shutdown).await;
        hub.unregister(session_id).await;
        info!(session_id = %session_id, "live session closed");
    })
}

async fn handle_socket(
    mut socket: WebSocket,
    session_id: SessionId,
    mut outbound: mpsc::Receiver<Frame>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            maybe_frame = outbound.recv() => {
                // None means the hub dropped this session.
                let Some(frame) = maybe_frame else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
            maybe_message = socket.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                match message {
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {
                        debug!(session_id = %session_id, "ignoring client frame");
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

