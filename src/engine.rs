//! Game engine
//!
//! Pure, synchronous turn logic for one game: board selection at start,
//! choosing a cell, resolving an answer, scoring and turn rotation.
//! Callers hold the room lock around every call; each operation validates
//! everything up front and only then mutates, so a rejected command leaves
//! the game exactly as it was.

use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;

/// What happened when an answer was resolved
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub turn: GameTurn,
    pub was_correct: bool,
    pub points_awarded: u32,
    pub correct_option: AnswerOption,
    /// Whose turn it is now (unchanged when the policy keeps the turn)
    pub next_player: Option<PlayerId>,
    pub finished: bool,
}

/// Validate a client-supplied category/level pair
pub fn parse_cell(category: &str, level: i64) -> GameResult<Cell> {
    let category = Category::parse(category)
        .ok_or_else(|| GameError::InvalidSelection(format!("unknown category '{}'", category)))?;
    let level = u8::try_from(level)
        .ok()
        .filter(|l| LEVELS.contains(l))
        .ok_or_else(|| {
            GameError::InvalidSelection(format!(
                "level {} is outside {}-{}",
                level, MIN_LEVEL, MAX_LEVEL
            ))
        })?;
    Ok(Cell::new(category, level))
}

/// Pick one active question per cell, uniformly among the candidates.
/// Fails listing every cell without candidates; nothing is returned in that case.
pub fn select_questions(bank: &[Question], rng: &mut impl Rng) -> GameResult<Vec<GameQuestion>> {
    let mut picked = Vec::with_capacity(Category::ALL.len() * LEVELS.count());
    let mut missing = Vec::new();

    for cell in Cell::all() {
        let candidates: Vec<&Question> = bank
            .iter()
            .filter(|q| q.is_active && q.cell() == cell)
            .collect();

        match candidates.choose(rng) {
            Some(question) => picked.push(GameQuestion {
                cell,
                question: (*question).clone(),
            }),
            None => missing.push(cell),
        }
    }

    if !missing.is_empty() {
        return Err(GameError::IncompleteBank { missing });
    }
    Ok(picked)
}

/// Next player after `current` in join order, wrapping around.
/// An unknown or absent current player yields the first in order; an empty roster yields None.
pub fn next_player(roster: &[GamePlayer], current: Option<&str>) -> Option<PlayerId> {
    let mut ordered: Vec<&GamePlayer> = roster.iter().collect();
    ordered.sort_by_key(|p| p.order);

    let first = ordered.first()?;
    let position = current.and_then(|id| ordered.iter().position(|p| p.player_id == id));

    let next = match position {
        Some(i) => ordered[(i + 1) % ordered.len()],
        None => first,
    };
    Some(next.player_id.clone())
}

impl Game {
    /// Build a fresh game for `roster` (join order) from the bank.
    /// The first player is drawn at random.
    pub fn new(
        roster: &[Player],
        bank: &[Question],
        rotation: RotationPolicy,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> GameResult<Game> {
        if roster.is_empty() {
            return Err(GameError::NotEnoughPlayers {
                required: 1,
                actual: 0,
            });
        }

        let questions = select_questions(bank, rng)?;

        let players = roster
            .iter()
            .enumerate()
            .map(|(order, p)| GamePlayer {
                player_id: p.id.clone(),
                order,
                score: 0,
            })
            .collect();

        let first = roster[rng.random_range(0..roster.len())].id.clone();

        Ok(Game {
            id: ulid::Ulid::new().to_string(),
            state: GameState::Choosing,
            rotation,
            current_player: Some(first),
            current_turn: None,
            started_at: now,
            finished_at: None,
            questions,
            players,
            turns: Vec::new(),
        })
    }

    pub fn is_current_player(&self, player_id: &str) -> bool {
        self.current_player.as_deref() == Some(player_id)
    }

    /// The open turn, if any (set iff state == Answering)
    pub fn active_turn(&self) -> Option<&GameTurn> {
        let id = self.current_turn.as_ref()?;
        self.turns.iter().find(|t| &t.id == id)
    }

    /// Most recently answered turn. Turns are appended in play order.
    pub fn last_resolved_turn(&self) -> Option<&GameTurn> {
        self.turns.iter().rev().find(|t| t.is_answered())
    }

    pub fn turn_for_cell(&self, cell: Cell) -> Option<&GameTurn> {
        self.turns.iter().find(|t| t.cell == cell)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions
            .iter()
            .map(|gq| &gq.question)
            .find(|q| q.id == question_id)
    }

    fn is_asked(&self, question_id: &str) -> bool {
        self.turns.iter().any(|t| t.question_id == question_id)
    }

    /// Board questions that have no turn yet
    pub fn remaining_questions(&self) -> usize {
        self.questions
            .iter()
            .filter(|gq| !self.is_asked(&gq.question.id))
            .count()
    }

    pub fn score_of(&self, player_id: &str) -> Option<u32> {
        self.players
            .iter()
            .find(|p| p.player_id == player_id)
            .map(|p| p.score)
    }

    /// choosing -> answering: open a turn on an unasked cell for the current player
    pub fn choose(
        &mut self,
        player_id: &str,
        cell: Cell,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> GameResult<GameTurn> {
        if !self.is_current_player(player_id) {
            return Err(GameError::NotYourTurn);
        }
        match self.state {
            GameState::Choosing => {}
            GameState::Answering => {
                return Err(GameError::InvalidSelection(
                    "a question is already active".to_string(),
                ))
            }
            GameState::Finished => {
                return Err(GameError::InvalidSelection(
                    "the game is finished".to_string(),
                ))
            }
        }
        if !LEVELS.contains(&cell.level) {
            return Err(GameError::InvalidSelection(format!(
                "level {} is outside {}-{}",
                cell.level, MIN_LEVEL, MAX_LEVEL
            )));
        }
        if self.turn_for_cell(cell).is_some() {
            return Err(GameError::InvalidSelection(format!(
                "{} has already been asked",
                cell
            )));
        }

        let candidates: Vec<&GameQuestion> = self
            .questions
            .iter()
            .filter(|gq| gq.cell == cell && !self.is_asked(&gq.question.id))
            .collect();
        let picked = candidates
            .choose(rng)
            .ok_or_else(|| GameError::InvalidSelection(format!("{} is not on the board", cell)))?;

        let turn = GameTurn {
            id: ulid::Ulid::new().to_string(),
            player_id: player_id.to_string(),
            question_id: picked.question.id.clone(),
            cell,
            started_at: now,
            answered_at: None,
            selected_option: None,
            was_correct: None,
            points_awarded: 0,
        };

        self.turns.push(turn.clone());
        self.current_turn = Some(turn.id.clone());
        self.state = GameState::Answering;
        Ok(turn)
    }

    /// answering -> choosing | finished: record the single answer of the open turn,
    /// award points and rotate according to `policy`.
    ///
    /// `expected_turn` is the turn the client was looking at; a stale or duplicate
    /// submission for an already answered turn is rejected with `AlreadyAnswered`.
    pub fn answer(
        &mut self,
        player_id: &str,
        option: AnswerOption,
        expected_turn: Option<&str>,
        policy: RotationPolicy,
        now: DateTime<Utc>,
    ) -> GameResult<AnswerOutcome> {
        if let Some(turn_id) = expected_turn {
            let turn = self
                .turns
                .iter()
                .find(|t| t.id == turn_id)
                .ok_or(GameError::NotFound("Turn"))?;
            if turn.is_answered() {
                return Err(GameError::AlreadyAnswered);
            }
        }

        if self.state != GameState::Answering {
            // No open turn: a late duplicate from whoever answered last
            return Err(match self.last_resolved_turn() {
                Some(t) if t.player_id == player_id => GameError::AlreadyAnswered,
                _ => GameError::NotYourTurn,
            });
        }
        if !self.is_current_player(player_id) {
            return Err(GameError::NotYourTurn);
        }

        let turn_id = self
            .current_turn
            .clone()
            .ok_or_else(|| GameError::InvalidSelection("no active question".to_string()))?;
        let turn_idx = self
            .turns
            .iter()
            .position(|t| t.id == turn_id)
            .ok_or(GameError::NotFound("Turn"))?;
        if self.turns[turn_idx].is_answered() {
            return Err(GameError::AlreadyAnswered);
        }

        let question = self
            .question(&self.turns[turn_idx].question_id)
            .ok_or(GameError::NotFound("Question"))?;
        let correct_option = question.correct_option;
        let was_correct = option == correct_option;
        let points_awarded = if was_correct {
            u32::from(question.difficulty)
        } else {
            0
        };

        let player_idx = self
            .players
            .iter()
            .position(|p| p.player_id == player_id)
            .ok_or(GameError::NotFound("Player"))?;

        // All checks passed; apply atomically
        {
            let turn = &mut self.turns[turn_idx];
            turn.selected_option = Some(option);
            turn.was_correct = Some(was_correct);
            turn.points_awarded = points_awarded;
            turn.answered_at = Some(now);
        }
        self.players[player_idx].score += points_awarded;
        self.current_turn = None;

        let finished = self.remaining_questions() == 0;
        if finished {
            self.state = GameState::Finished;
            self.finished_at = Some(now);
        } else {
            self.state = GameState::Choosing;
            if policy.rotates_after(was_correct) {
                self.current_player = next_player(&self.players, Some(player_id));
            }
        }

        Ok(AnswerOutcome {
            turn: self.turns[turn_idx].clone(),
            was_correct,
            points_awarded,
            correct_option,
            next_player: self.current_player.clone(),
            finished,
        })
    }
}
