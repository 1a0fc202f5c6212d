//! Game commands: start, choose and answer, each inside the room's critical section

use super::AppState;
use crate::broadcast::RoomEvent;
use crate::engine::{self, AnswerOutcome};
use crate::error::{GameError, GameResult};
use crate::projector::{self, GameView};
use crate::types::*;

impl AppState {
    /// Start (or restart) the room's game. Host only.
    /// A restart replaces the previous game with everything it owned.
    pub async fn start_game(
        &self,
        code: &str,
        session: &SessionToken,
        rotation: Option<RotationPolicy>,
    ) -> GameResult<Game> {
        let handle = self.room(code).await?;
        let mut room = handle.lock().await;

        let host = room.host().ok_or(GameError::NotHost)?;
        if &host.session != session {
            return Err(GameError::NotHost);
        }
        if room.players.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers {
                required: self.config.min_players,
                actual: room.players.len(),
            });
        }

        let rotation = rotation.unwrap_or(self.config.default_rotation);
        let now = chrono::Utc::now();
        let game = {
            let bank = self.bank.read().await;
            let mut rng = rand::rng();
            Game::new(&room.players, bank.questions(), rotation, &mut rng, now)?
        };

        if !room.room.started {
            room.room.started = true;
            room.room.started_at = Some(now);
        }
        let restarted = room.game.replace(game.clone()).is_some();
        drop(room);

        tracing::info!(
            "Game {} {} in room {} ({} players, rotation {:?})",
            game.id,
            if restarted { "restarted" } else { "started" },
            handle.code,
            game.players.len(),
            game.rotation
        );
        handle.publish(RoomEvent::GameStarted);
        Ok(game)
    }

    /// Current player picks a board cell
    pub async fn choose_question(
        &self,
        code: &str,
        session: &SessionToken,
        category: &str,
        level: i64,
    ) -> GameResult<GameTurn> {
        let handle = self.room(code).await?;
        let mut room = handle.lock().await;

        let player_id = room
            .player_by_session(session)
            .map(|p| p.id.clone())
            .ok_or(GameError::NotYourTurn)?;
        let game = room.game.as_mut().ok_or(GameError::NotFound("Game"))?;
        if !game.is_current_player(&player_id) {
            return Err(GameError::NotYourTurn);
        }
        let cell = engine::parse_cell(category, level)?;

        let turn = {
            let mut rng = rand::rng();
            game.choose(&player_id, cell, &mut rng, chrono::Utc::now())?
        };
        drop(room);

        tracing::info!("Room {}: {} chose {}", handle.code, player_id, cell);
        handle.publish(RoomEvent::QuestionChosen { cell });
        Ok(turn)
    }

    /// Current player answers the open question.
    /// Exactly one of several concurrent submissions for a turn succeeds.
    pub async fn submit_answer(
        &self,
        code: &str,
        session: &SessionToken,
        option: AnswerOption,
        turn_id: Option<&str>,
    ) -> GameResult<AnswerOutcome> {
        let handle = self.room(code).await?;
        let mut room = handle.lock().await;

        let player_id = room
            .player_by_session(session)
            .map(|p| p.id.clone())
            .ok_or(GameError::NotYourTurn)?;
        let game = room.game.as_mut().ok_or(GameError::NotFound("Game"))?;
        let policy = game.rotation;
        let outcome = game.answer(&player_id, option, turn_id, policy, chrono::Utc::now())?;
        drop(room);

        tracing::info!(
            "Room {}: {} answered {} ({}, +{})",
            handle.code,
            player_id,
            outcome.turn.cell,
            if outcome.was_correct { "correct" } else { "wrong" },
            outcome.points_awarded
        );
        handle.publish(RoomEvent::AnswerResolved {
            cell: outcome.turn.cell,
            was_correct: outcome.was_correct,
        });
        if outcome.finished {
            tracing::info!("Room {}: game finished", handle.code);
            handle.publish(RoomEvent::GameFinished);
        }
        Ok(outcome)
    }

    /// Game snapshot for one viewer
    pub async fn game_view(
        &self,
        code: &str,
        viewer: Option<&SessionToken>,
    ) -> GameResult<GameView> {
        let handle = self.room(code).await?;
        let room = handle.lock().await;
        Ok(projector::project_game(&room, viewer))
    }
}
