//! Player message handlers
//!
//! Joining and leaving the lobby, choosing a cell and answering.

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{AnswerOption, SessionToken, TurnId};
use std::sync::Arc;

pub async fn handle_join(
    state: &Arc<AppState>,
    code: &str,
    session: &SessionToken,
    nickname: String,
    icon: String,
) -> Option<ServerMessage> {
    tracing::info!("Join request for room {}: {} as {}", code, nickname, icon);
    match state.join_room(code, session, &nickname, &icon).await {
        Ok(player) => Some(ServerMessage::Joined {
            player_id: player.id,
            nickname: player.nickname,
        }),
        Err(e) => {
            tracing::warn!("Join rejected in room {}: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_leave(
    state: &Arc<AppState>,
    code: &str,
    session: &SessionToken,
) -> Option<ServerMessage> {
    match state.leave_room(code, session).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Leave rejected in room {}: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_choose(
    state: &Arc<AppState>,
    code: &str,
    session: &SessionToken,
    category: String,
    level: i64,
) -> Option<ServerMessage> {
    match state.choose_question(code, session, &category, level).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Choose ({}, {}) rejected in room {}: {}", category, level, code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_answer(
    state: &Arc<AppState>,
    code: &str,
    session: &SessionToken,
    option: String,
    turn_id: Option<TurnId>,
) -> Option<ServerMessage> {
    let Some(option) = AnswerOption::parse(&option) else {
        return Some(GameError::InvalidInput(format!("'{}' is not A, B or C", option)).into());
    };

    match state
        .submit_answer(code, session, option, turn_id.as_deref())
        .await
    {
        Ok(outcome) => Some(ServerMessage::AnswerAccepted {
            turn_id: outcome.turn.id,
            was_correct: outcome.was_correct,
            points_awarded: outcome.points_awarded,
            correct_option: outcome.correct_option,
        }),
        Err(e) => {
            tracing::warn!("Answer rejected in room {}: {}", code, e);
            Some(e.into())
        }
    }
}
