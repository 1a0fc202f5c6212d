//! WebSocket message dispatch
//!
//! Commands act as the connection's session identity; the handlers return the
//! direct reply (a rejection or a short acknowledgement). Resulting state
//! reaches every connection through the room broadcast.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::SessionToken;
use std::sync::Arc;

use super::{host, player};

/// Handle a client command and return the optional direct reply
pub async fn handle_message(
    msg: ClientMessage,
    code: &str,
    session: &SessionToken,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Answered by the socket loop with a fresh snapshot
        ClientMessage::Ping => None,

        ClientMessage::Join { nickname, icon } => {
            player::handle_join(state, code, session, nickname, icon).await
        }

        ClientMessage::Leave => player::handle_leave(state, code, session).await,

        ClientMessage::Start { rotation } => {
            host::handle_start(state, code, session, rotation).await
        }

        ClientMessage::Choose { category, level } => {
            player::handle_choose(state, code, session, category, level).await
        }

        ClientMessage::Answer { option, turn_id } => {
            player::handle_answer(state, code, session, option, turn_id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::state_with_bank;
    use crate::types::*;

    async fn setup() -> (Arc<AppState>, RoomCode, SessionToken, SessionToken) {
        let state = Arc::new(state_with_bank().await);
        let room = state.create_room().await;
        let ada = SessionToken::from("ada");
        let bea = SessionToken::from("bea");
        for (session, icon) in [(&ada, "volpe"), (&bea, "gatto")] {
            let reply = handle_message(
                ClientMessage::Join {
                    nickname: session.as_str().to_string(),
                    icon: icon.to_string(),
                },
                &room.code,
                session,
                &state,
            )
            .await;
            assert!(matches!(reply, Some(ServerMessage::Joined { .. })));
        }
        (state, room.code, ada, bea)
    }

    fn error_code(reply: Option<ServerMessage>) -> String {
        match reply {
            Some(ServerMessage::Error { code, .. }) => code,
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_has_no_direct_reply() {
        let (state, code, ada, _) = setup().await;
        assert!(handle_message(ClientMessage::Ping, &code, &ada, &state)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_join_rejections_are_reported() {
        let (state, code, _, _) = setup().await;
        let reply = handle_message(
            ClientMessage::Join {
                nickname: "ADA".to_string(),
                icon: "cane".to_string(),
            },
            &code,
            &SessionToken::from("cai"),
            &state,
        )
        .await;
        assert_eq!(error_code(reply), "NICKNAME_TAKEN");

        let reply = handle_message(
            ClientMessage::Join {
                nickname: "cai".to_string(),
                icon: "gatto".to_string(),
            },
            &code,
            &SessionToken::from("cai"),
            &state,
        )
        .await;
        assert_eq!(error_code(reply), "ICON_TAKEN");
    }

    #[tokio::test]
    async fn test_start_is_host_only() {
        let (state, code, ada, bea) = setup().await;

        let reply = handle_message(ClientMessage::Start { rotation: None }, &code, &bea, &state).await;
        assert_eq!(error_code(reply), "NOT_HOST");

        let reply = handle_message(ClientMessage::Start { rotation: None }, &code, &ada, &state).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_leave_after_start_is_rejected() {
        let (state, code, ada, bea) = setup().await;
        handle_message(ClientMessage::Start { rotation: None }, &code, &ada, &state).await;

        let reply = handle_message(ClientMessage::Leave, &code, &bea, &state).await;
        assert_eq!(error_code(reply), "ROOM_ALREADY_STARTED");
    }

    #[tokio::test]
    async fn test_invalid_option_is_rejected() {
        let (state, code, ada, _) = setup().await;
        handle_message(ClientMessage::Start { rotation: None }, &code, &ada, &state).await;

        let reply = handle_message(
            ClientMessage::Answer {
                option: "D".to_string(),
                turn_id: None,
            },
            &code,
            &ada,
            &state,
        )
        .await;
        assert_eq!(error_code(reply), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let state = Arc::new(AppState::new());
        let reply = handle_message(ClientMessage::Leave, "NOPE22", &SessionToken::from("a"), &state).await;
        assert_eq!(error_code(reply), "NOT_FOUND");
    }
}
