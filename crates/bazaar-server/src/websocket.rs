//! WebSocket gateway: upgrade, register with the hub, pump frames both ways.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use bazaar_core::{ConnectionId, HubError, Role};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::connection::Outbound;
use crate::hub::HubHandle;
use crate::server::AppState;

/// Longest name hint kept from the connect URL, in characters.
const MAX_NAME_HINT: usize = 32;

/// Query parameters of `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub role: Option<String>,
    pub name: Option<String>,
}

impl ConnectParams {
    /// Requested role; anything unrecognized falls back to participant.
    pub fn role(&self) -> Role {
        match self.role.as_deref() {
            None | Some("") => Role::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "unrecognized role requested, defaulting to participant");
                Role::default()
            }),
        }
    }

    pub fn name_hint(&self) -> Option<String> {
        let name = self.name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        Some(name.chars().take(MAX_NAME_HINT).collect())
    }
}

/// `GET /ws?role=participant|observer&name=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let role = params.role();
    let name_hint = params.name_hint();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, role, name_hint, state))
}

async fn handle_socket(socket: WebSocket, role: Role, name_hint: Option<String>, state: AppState) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::channel(state.config.send_queue);
    info!(conn_id = %id, %role, "websocket connected");

    if let Err(e) = state.hub.connect(id.clone(), role, name_hint, tx).await {
        warn!(conn_id = %id, error = %e, "hub unavailable, dropping connection");
        return;
    }
    run_connection(socket, id, rx, state.hub).await;
}

/// Pump one socket until either direction ends, then tell the hub.
///
/// The writer drains the connection's outbound queue onto the socket; the
/// reader forwards text frames and pongs to the hub loop.
pub async fn run_connection(
    socket: WebSocket,
    id: ConnectionId,
    mut rx: mpsc::Receiver<Outbound>,
    hub: HubHandle,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let frame = match message {
                Outbound::Text(text) => WsMessage::Text(text.as_str().into()),
                Outbound::Ping => {
                    trace!(conn_id = %writer_id, "ping");
                    WsMessage::Ping(Vec::new().into())
                }
                Outbound::Close => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            };
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let reader_id = id.clone();
    let reader_hub = hub.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            let forwarded = match frame {
                Ok(WsMessage::Text(text)) => {
                    reader_hub
                        .inbound(reader_id.clone(), text.to_string())
                        .await
                }
                Ok(WsMessage::Pong(_)) => reader_hub.activity(reader_id.clone()).await,
                Ok(WsMessage::Binary(_)) => {
                    debug!(conn_id = %reader_id, "binary frame ignored");
                    Ok(())
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(WsMessage::Ping(_)) => Ok(()),
                Err(e) => {
                    let error = read_failure(e);
                    warn!(conn_id = %reader_id, error_kind = error.error_kind(), error = %error, "websocket read failed");
                    return error.to_string();
                }
            };
            if forwarded.is_err() {
                break;
            }
        }
        "peer closed".to_string()
    });

    let reason = tokio::select! {
        _ = &mut writer => {
            reader.abort();
            "outbound closed".to_string()
        }
        ended = &mut reader => {
            writer.abort();
            ended.unwrap_or_else(|e| read_failure(e).to_string())
        }
    };

    info!(conn_id = %id, reason = %reason, "websocket disconnected");
    let _ = hub.disconnect(id, reason).await;
}

fn read_failure(err: impl std::fmt::Display) -> HubError {
    HubError::ConnectionFailure(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(role: Option<&str>, name: Option<&str>) -> ConnectParams {
        ConnectParams {
            role: role.map(String::from),
            name: name.map(String::from),
        }
    }

    #[test]
    fn role_defaults_to_participant() {
        assert_eq!(params(None, None).role(), Role::Participant);
        assert_eq!(params(Some(""), None).role(), Role::Participant);
        assert_eq!(params(Some("wizard"), None).role(), Role::Participant);
    }

    #[test]
    fn observer_role_parsed() {
        assert_eq!(params(Some("observer"), None).role(), Role::Observer);
        assert_eq!(params(Some("Observer"), None).role(), Role::Observer);
    }

    #[test]
    fn read_errors_are_connection_failures() {
        let error = read_failure("connection reset by peer");
        assert_eq!(error.error_kind(), "connection_failure");
        assert_eq!(error.to_string(), "connection failure: connection reset by peer");
    }

    #[test]
    fn name_hint_trimmed_and_capped() {
        assert_eq!(params(None, Some("  Alice ")).name_hint().as_deref(), Some("Alice"));
        assert_eq!(params(None, Some("   ")).name_hint(), None);
        assert_eq!(params(None, None).name_hint(), None);
        let long = "x".repeat(100);
        assert_eq!(params(None, Some(&long)).name_hint().unwrap().len(), MAX_NAME_HINT);
    }
}
