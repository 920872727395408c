use shared::services::session_registry::SessionHandle;

use crate::actions::Connection;
use crate::state::AppState;

pub fn handle_connect(state: &AppState, user_id: &str, handle: SessionHandle) -> Connection {
    state.matchmaking_service.connect(user_id, handle.clone());
    Connection {
        user_id: user_id.to_string(),
        handle,
    }
}

/// Identity for a socket that did not name a user.
pub fn anonymous_user_id(handle: &SessionHandle) -> String {
    format!("anon_{}", handle.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::test_state;

    #[test]
    fn test_anonymous_ids_are_unique_per_connection() {
        let (first, _rx1) = SessionHandle::channel();
        let (second, _rx2) = SessionHandle::channel();

        assert!(anonymous_user_id(&first).starts_with("anon_"));
        assert_ne!(anonymous_user_id(&first), anonymous_user_id(&second));
    }

    #[test]
    fn test_connect_binds_session() {
        let state = test_state();
        let (handle, _rx) = SessionHandle::channel();

        let connection = handle_connect(&state, "alice", handle.clone());

        assert_eq!(connection.user_id, "alice");
        assert_eq!(
            state.matchmaking_service.registry().resolve("alice"),
            Some(handle)
        );
    }
}
