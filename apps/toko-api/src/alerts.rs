//! Live alert feed.
//!
//! ```text
//!  AlertDispatcher ──▶ BroadcastSink ──subscribe──▶ /alerts/ws (one per client)
//!                                                       │
//!                                                       ▼
//!                                            JSON text frame per signal
//! ```
//!
//! The feed is push-only. Anything the client sends except Close is ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use toko_core::StockSignal;

use crate::extract::CurrentActor;
use crate::AppState;

/// Upgrades to a WebSocket that streams every dispatched signal.
pub async fn alert_feed(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    info!(user_id = %actor.user_id, "Alert feed connected");
    let signals = state.alerts.subscribe();
    ws.on_upgrade(move |socket| forward_signals(socket, signals, actor.user_id))
}

async fn forward_signals(
    mut socket: WebSocket,
    mut signals: broadcast::Receiver<StockSignal>,
    user_id: String,
) {
    loop {
        tokio::select! {
            received = signals.recv() => match received {
                Ok(signal) => {
                    let Ok(json) = serde_json::to_string(&signal) else {
                        continue;
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "Alert feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(user_id = %user_id, error = %e, "Alert feed socket error");
                    break;
                }
            },
        }
    }

    info!(user_id = %user_id, "Alert feed disconnected");
}
