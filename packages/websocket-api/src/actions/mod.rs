//! Handlers for inbound WebSocket events, one module per event type.
//!
//! Each handler returns the reply to push back on the sender's own session,
//! if any. Events meant for the other party go through the delivery service.

use shared::models::events::{ClientEvent, ServerEvent};
use shared::services::session_registry::SessionHandle;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub mod connect;
pub mod disconnect;
pub mod end_chat;
pub mod heartbeat;
pub mod join_queue;
pub mod leave_queue;
pub mod send_message;

/// One open socket: who it belongs to and the handle events reach it through.
#[derive(Debug, Clone)]
pub struct Connection {
    pub user_id: String,
    pub handle: SessionHandle,
}

pub async fn dispatch(
    state: &AppState,
    connection: &Connection,
    frame: &str,
) -> Option<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(frame) {
        Ok(event) => event,
        Err(e) => {
            debug!(user_id = %connection.user_id, error = %e, "Rejected malformed frame");
            return Some(ServerEvent::error(format!("Invalid event: {}", e)));
        }
    };

    let user_id = connection.user_id.as_str();
    let result = match event {
        ClientEvent::JoinQueue { preferences } => {
            join_queue::handle_join_queue(state, user_id, preferences).await
        }
        ClientEvent::LeaveQueue => leave_queue::handle_leave_queue(state, user_id).await,
        ClientEvent::SendMessage {
            conversation_id,
            content,
        } => send_message::handle_send_message(state, user_id, &conversation_id, &content).await,
        ClientEvent::EndChat {
            conversation_id,
            rating,
            report_reason,
        } => {
            end_chat::handle_end_chat(state, user_id, &conversation_id, rating, report_reason)
                .await
        }
        ClientEvent::Heartbeat => heartbeat::handle_heartbeat(state, user_id).await,
    };

    match result {
        Ok(reply) => reply,
        Err(e) => Some(e.into_event(user_id)),
    }
}

pub type ActionResult = Result<Option<ServerEvent>, ApiError>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use shared::config::MatchmakingConfig;
    use shared::models::conversation::EndReason;
    use shared::repositories::memory_repository::InMemoryStore;
    use shared::services::matchmaking_service::MatchmakingService;
    use shared::services::session_registry::SessionRegistry;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    pub(crate) fn test_state() -> AppState {
        let store = Arc::new(InMemoryStore::new());
        let service = MatchmakingService::new(
            store.clone(),
            store,
            Arc::new(SessionRegistry::new()),
            MatchmakingConfig::default(),
        );
        AppState {
            matchmaking_service: Arc::new(service),
        }
    }

    pub(crate) fn open(
        state: &AppState,
        user_id: &str,
    ) -> (Connection, UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = SessionHandle::channel();
        (connect::handle_connect(state, user_id, handle), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_malformed_frame_yields_error_event() {
        let state = test_state();
        let (alice, _rx) = open(&state, "alice");

        let reply = dispatch(&state, &alice, "{not json").await;
        let unknown = dispatch(&state, &alice, r#"{"type":"dance"}"#).await;

        assert!(matches!(reply, Some(ServerEvent::Error { .. })));
        assert!(matches!(unknown, Some(ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_join_twice_reports_already_queued() {
        let state = test_state();
        let (alice, mut rx) = open(&state, "alice");

        assert_eq!(dispatch(&state, &alice, r#"{"type":"join-queue"}"#).await, None);
        let reply = dispatch(&state, &alice, r#"{"type":"join-queue"}"#).await;

        assert_eq!(reply, Some(ServerEvent::error("User is already in the queue")));
        assert_eq!(drain(&mut rx)[0].kind(), "queue-joined");
    }

    #[tokio::test]
    async fn test_full_chat_flow() {
        let state = test_state();
        let (alice, mut alice_rx) = open(&state, "alice");
        let (bob, mut bob_rx) = open(&state, "bob");

        dispatch(&state, &alice, r#"{"type":"join-queue","preferences":{"language":"en"}}"#).await;
        dispatch(&state, &bob, r#"{"type":"join-queue"}"#).await;

        let conversation_id = match drain(&mut alice_rx).pop() {
            Some(ServerEvent::MatchFound { conversation, .. }) => conversation.id,
            other => panic!("expected match-found, got {:?}", other),
        };
        drain(&mut bob_rx);

        let send = format!(
            r#"{{"type":"send-message","conversation_id":"{}","content":"hello"}}"#,
            conversation_id
        );
        assert_eq!(dispatch(&state, &alice, &send).await, None);
        assert!(matches!(
            drain(&mut bob_rx).as_slice(),
            [ServerEvent::MessageReceived { sender, content, .. }] if sender == "alice" && content == "hello"
        ));

        let end = format!(
            r#"{{"type":"end-chat","conversation_id":"{}","rating":5}}"#,
            conversation_id
        );
        let reply = dispatch(&state, &bob, &end).await;
        assert_eq!(
            reply,
            Some(ServerEvent::ChatEnded {
                conversation_id: conversation_id.clone(),
                reason: EndReason::Left
            })
        );
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::ChatEnded {
                conversation_id: conversation_id.clone(),
                reason: EndReason::Left
            }]
        );

        let late = dispatch(&state, &alice, &send).await;
        assert_eq!(late, Some(ServerEvent::error("Conversation is not active")));
    }

    #[tokio::test]
    async fn test_message_to_unknown_conversation() {
        let state = test_state();
        let (alice, _rx) = open(&state, "alice");

        let reply = dispatch(
            &state,
            &alice,
            r#"{"type":"send-message","conversation_id":"nope","content":"hi"}"#,
        )
        .await;

        assert_eq!(reply, Some(ServerEvent::error("Conversation not found")));
    }
}
