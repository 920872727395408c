use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::services::session_registry::SessionHandle;
use tracing::{debug, error, info};

use crate::actions::{self, connect, disconnect};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(websocket_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub user_id: Option<String>,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, requested_user: Option<String>) {
    let (handle, mut outbound) = SessionHandle::channel();
    let user_id = requested_user
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| connect::anonymous_user_id(&handle));
    let connection = connect::handle_connect(&state, &user_id, handle);
    info!(user_id = %user_id, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {} event: {}", event.kind(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let reply = actions::dispatch(&state, &connection, text.as_str()).await;
                    if let Some(reply) = reply {
                        if connection.handle.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(user_id = %connection.user_id, error = %e, "WebSocket error");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    disconnect::handle_disconnect(&state, &connection).await;
    writer.abort();
    info!(user_id = %connection.user_id, "WebSocket connection closed");
}
