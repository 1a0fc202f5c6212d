use crate::error::GameError;
use crate::projector::{GameView, LobbyView, ViewerSnapshot};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Re-send my snapshot now
    Ping,
    Join {
        nickname: String,
        icon: String,
    },
    Leave,
    // Host-only
    Start {
        #[serde(default)]
        rotation: Option<RotationPolicy>,
    },
    Choose {
        category: String,
        level: i64,
    },
    Answer {
        option: String,
        /// Turn the client was looking at when it answered
        #[serde(default)]
        turn_id: Option<TurnId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomState(LobbyView),
    GameState(Box<ViewerSnapshot>),
    NotStarted {
        room: RoomCode,
    },
    NotFound,
    Joined {
        player_id: PlayerId,
        nickname: String,
    },
    AnswerAccepted {
        turn_id: TurnId,
        was_correct: bool,
        points_awarded: u32,
        correct_option: AnswerOption,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<GameView> for ServerMessage {
    fn from(view: GameView) -> Self {
        match view {
            GameView::NotStarted { room } => ServerMessage::NotStarted { room },
            GameView::Started(snapshot) => ServerMessage::GameState(snapshot),
        }
    }
}

impl From<LobbyView> for ServerMessage {
    fn from(view: LobbyView) -> Self {
        ServerMessage::RoomState(view)
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"choose","category":"storia","level":3}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Choose { ref category, level: 3 } if category == "storia"));

        let msg: ClientMessage = serde_json::from_str(r#"{"t":"answer","option":"b"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Answer { turn_id: None, .. }));

        let msg: ClientMessage = serde_json::from_str(r#"{"t":"start"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Start { rotation: None }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"start","rotation":"on_wrong_only"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Start {
                rotation: Some(RotationPolicy::OnWrongOnly)
            }
        ));
    }

    #[test]
    fn test_start_accepts_env_rotation_spellings() {
        for raw in ["on_wrong", "wrong", "on_wrong_only"] {
            let msg: ClientMessage =
                serde_json::from_value(json!({"t": "start", "rotation": raw})).unwrap();
            assert!(matches!(
                msg,
                ClientMessage::Start {
                    rotation: Some(RotationPolicy::OnWrongOnly)
                }
            ));
            assert_eq!(RotationPolicy::parse(raw), Some(RotationPolicy::OnWrongOnly));
        }
        // Always serialized under the canonical name
        assert_eq!(
            serde_json::to_value(RotationPolicy::OnWrongOnly).unwrap(),
            json!("on_wrong_only")
        );
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"t":"cheat"}"#).is_err());
    }

    #[test]
    fn test_error_message_shape() {
        let msg = ServerMessage::from(GameError::NotYourTurn);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"t": "error", "code": "NOT_YOUR_TURN", "msg": "It is not your turn"})
        );
    }

    #[test]
    fn test_not_started_and_not_found_shape() {
        let msg = ServerMessage::from(GameView::NotStarted {
            room: "ABC234".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"t": "not_started", "room": "ABC234"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::NotFound).unwrap(),
            json!({"t": "not_found"})
        );
    }
}
