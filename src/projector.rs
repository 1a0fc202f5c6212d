//! Per-viewer snapshots
//!
//! Pure functions from room state plus the viewer's session to what that
//! viewer may see and do. Shared by the HTTP pull endpoints and the
//! WebSocket push path; nothing here is cached, so permission flags are
//! always derived from the state at the moment of delivery.

use crate::config::ServerConfig;
use crate::state::RoomState;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

// ========== Lobby ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconInfo {
    pub value: String,
    pub emoji: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub nickname: String,
    pub icon: String,
    pub icon_display: String,
    pub is_host: bool,
    pub is_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyView {
    pub room: RoomCode,
    pub players: Vec<LobbyPlayer>,
    pub players_count: usize,
    pub max_players: usize,
    pub min_players: usize,
    pub can_start: bool,
    pub host: Option<String>,
    pub host_is_me: bool,
    pub is_member: bool,
    pub started: bool,
    pub join_url: String,
    /// Icons nobody in the room has taken yet
    pub available_icons: Vec<IconInfo>,
}

pub fn project_lobby(
    state: &RoomState,
    viewer: Option<&SessionToken>,
    config: &ServerConfig,
) -> LobbyView {
    let host = state.host();
    let is_me = |p: &Player| viewer.is_some_and(|s| &p.session == s);

    let players = state
        .players
        .iter()
        .map(|p| LobbyPlayer {
            nickname: p.nickname.clone(),
            icon: p.icon.clone(),
            icon_display: icon_display(&p.icon),
            is_host: host.is_some_and(|h| h.id == p.id),
            is_me: is_me(p),
        })
        .collect();

    let available_icons = ICON_SET
        .iter()
        .filter(|(value, _, _)| !state.players.iter().any(|p| p.icon == *value))
        .map(|(value, emoji, label)| IconInfo {
            value: value.to_string(),
            emoji: emoji.to_string(),
            label: label.to_string(),
        })
        .collect();

    LobbyView {
        room: state.room.code.clone(),
        players,
        players_count: state.players.len(),
        max_players: config.max_players,
        min_players: config.min_players,
        can_start: state.players.len() >= config.min_players,
        host: host.map(|h| h.nickname.clone()),
        host_is_me: host.is_some_and(is_me),
        is_member: state.players.iter().any(is_me),
        started: state.room.started,
        join_url: config.join_url(&state.room.code),
        available_icons,
    }
}

// ========== Game ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Available,
    Active,
    Asked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub nickname: String,
    pub icon: String,
    pub icon_display: String,
    pub score: u32,
    pub order: usize,
    pub is_current: bool,
    pub is_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCell {
    pub category: Category,
    pub level: u8,
    pub status: CellStatus,
    /// Who drew the cell (active or asked)
    pub player: Option<String>,
    pub was_correct: Option<bool>,
    pub selected_option: Option<AnswerOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub value: Category,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub categories: Vec<CategoryInfo>,
    pub levels: Vec<u8>,
    /// Category-major, ascending level
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
}

/// The open question. Text and options are present only for the player answering it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveQuestion {
    pub turn_id: TurnId,
    pub category: Category,
    pub category_label: String,
    pub level: u8,
    pub player: String,
    pub text: Option<String>,
    pub options: Option<QuestionOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastAnswer {
    pub turn_id: TurnId,
    pub player: String,
    pub category: Category,
    pub level: u8,
    pub text: String,
    pub selected_option: Option<AnswerOption>,
    pub correct_option: AnswerOption,
    pub correct_text: String,
    pub was_correct: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub room: RoomCode,
    pub game_id: GameId,
    pub state: GameState,
    pub rotation: RotationPolicy,
    pub me: Option<Viewer>,
    pub current_player: Option<String>,
    pub current_player_is_me: bool,
    pub remaining: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Top scorers once the game is finished
    pub winners: Vec<String>,
    pub scoreboard: Vec<ScoreEntry>,
    pub grid: Grid,
    pub active_question: Option<ActiveQuestion>,
    pub can_choose: bool,
    pub can_answer: bool,
    pub last_answer: Option<LastAnswer>,
}

#[derive(Debug, Clone)]
pub enum GameView {
    NotStarted { room: RoomCode },
    Started(Box<ViewerSnapshot>),
}

impl GameView {
    pub fn snapshot(&self) -> Option<&ViewerSnapshot> {
        match self {
            GameView::Started(snapshot) => Some(snapshot.as_ref()),
            GameView::NotStarted { .. } => None,
        }
    }
}

fn nickname_of(state: &RoomState, player_id: &str) -> String {
    state
        .player(player_id)
        .map(|p| p.nickname.clone())
        .unwrap_or_else(|| player_id.to_string())
}

fn scoreboard(state: &RoomState, game: &Game, me: Option<&str>) -> Vec<ScoreEntry> {
    let mut entries: Vec<ScoreEntry> = game
        .players
        .iter()
        .map(|gp| {
            let player = state.player(&gp.player_id);
            let icon = player.map(|p| p.icon.clone()).unwrap_or_default();
            ScoreEntry {
                player_id: gp.player_id.clone(),
                nickname: nickname_of(state, &gp.player_id),
                icon_display: icon_display(&icon),
                icon,
                score: gp.score,
                order: gp.order,
                is_current: game.is_current_player(&gp.player_id),
                is_me: me == Some(gp.player_id.as_str()),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        Reverse(a.score)
            .cmp(&Reverse(b.score))
            .then_with(|| a.nickname.to_lowercase().cmp(&b.nickname.to_lowercase()))
            .then_with(|| a.nickname.cmp(&b.nickname))
    });
    entries
}

fn grid(state: &RoomState, game: &Game) -> Grid {
    let cells = Cell::all()
        .into_iter()
        .map(|cell| match game.turn_for_cell(cell) {
            Some(turn) => GridCell {
                category: cell.category,
                level: cell.level,
                status: if turn.is_answered() {
                    CellStatus::Asked
                } else {
                    CellStatus::Active
                },
                player: Some(nickname_of(state, &turn.player_id)),
                was_correct: turn.was_correct,
                selected_option: turn.selected_option,
            },
            None => GridCell {
                category: cell.category,
                level: cell.level,
                status: CellStatus::Available,
                player: None,
                was_correct: None,
                selected_option: None,
            },
        })
        .collect();

    Grid {
        categories: Category::ALL
            .iter()
            .map(|c| CategoryInfo {
                value: *c,
                label: c.label().to_string(),
            })
            .collect(),
        levels: LEVELS.collect(),
        cells,
    }
}

fn active_question(state: &RoomState, game: &Game, me: Option<&str>) -> Option<ActiveQuestion> {
    let turn = game.active_turn()?;
    let question = game.question(&turn.question_id)?;
    let revealed = me == Some(turn.player_id.as_str());

    Some(ActiveQuestion {
        turn_id: turn.id.clone(),
        category: turn.cell.category,
        category_label: turn.cell.category.label().to_string(),
        level: turn.cell.level,
        player: nickname_of(state, &turn.player_id),
        text: revealed.then(|| question.text.clone()),
        options: revealed.then(|| QuestionOptions {
            a: question.option_a.clone(),
            b: question.option_b.clone(),
            c: question.option_c.clone(),
        }),
    })
}

fn last_answer(state: &RoomState, game: &Game) -> Option<LastAnswer> {
    let turn = game.last_resolved_turn()?;
    let question = game.question(&turn.question_id)?;

    Some(LastAnswer {
        turn_id: turn.id.clone(),
        player: nickname_of(state, &turn.player_id),
        category: turn.cell.category,
        level: turn.cell.level,
        text: question.text.clone(),
        selected_option: turn.selected_option,
        correct_option: question.correct_option,
        correct_text: question.option_text(question.correct_option).to_string(),
        was_correct: turn.was_correct.unwrap_or(false),
        points_awarded: turn.points_awarded,
    })
}

fn winners(state: &RoomState, game: &Game) -> Vec<String> {
    if game.state != GameState::Finished {
        return Vec::new();
    }
    let Some(best) = game.players.iter().map(|p| p.score).max() else {
        return Vec::new();
    };
    let mut names: Vec<String> = game
        .players
        .iter()
        .filter(|p| p.score == best)
        .map(|p| nickname_of(state, &p.player_id))
        .collect();
    names.sort_by_key(|n| n.to_lowercase());
    names
}

/// Game snapshot for one viewer; `NotStarted` until the room has a game
pub fn project_game(state: &RoomState, viewer: Option<&SessionToken>) -> GameView {
    let game = match &state.game {
        Some(game) if state.room.started => game,
        _ => {
            return GameView::NotStarted {
                room: state.room.code.clone(),
            }
        }
    };

    let me = viewer.and_then(|s| state.player_by_session(s));
    let me_id = me.map(|p| p.id.as_str());
    let is_current = me_id.is_some_and(|id| game.is_current_player(id));

    let snapshot = ViewerSnapshot {
        room: state.room.code.clone(),
        game_id: game.id.clone(),
        state: game.state,
        rotation: game.rotation,
        me: me.map(|p| Viewer {
            player_id: p.id.clone(),
            nickname: p.nickname.clone(),
            score: game.score_of(&p.id).unwrap_or(0),
        }),
        current_player: game
            .current_player
            .as_deref()
            .map(|id| nickname_of(state, id)),
        current_player_is_me: is_current,
        remaining: game.remaining_questions(),
        started_at: game.started_at,
        finished_at: game.finished_at,
        winners: winners(state, game),
        scoreboard: scoreboard(state, game, me_id),
        grid: grid(state, game),
        active_question: active_question(state, game, me_id),
        can_choose: is_current && game.state == GameState::Choosing,
        can_answer: is_current && game.state == GameState::Answering,
        last_answer: last_answer(state, game),
    };
    GameView::Started(Box::new(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::full_bank;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn room_state(names: &[&str]) -> RoomState {
        let mut state = RoomState::new(Room {
            code: "ABC234".to_string(),
            created_at: Utc::now(),
            started: false,
            started_at: None,
        });
        for (i, name) in names.iter().enumerate() {
            state.players.push(Player {
                id: format!("p-{}", name),
                nickname: name.to_string(),
                icon: ICON_SET[i].0.to_string(),
                session: SessionToken(format!("s-{}", name)),
                joined_at: Utc::now(),
            });
        }
        state
    }

    fn started(names: &[&str], seed: u64) -> RoomState {
        let mut state = room_state(names);
        let mut rng = StdRng::seed_from_u64(seed);
        let game = Game::new(
            &state.players,
            &full_bank(),
            RotationPolicy::Always,
            &mut rng,
            Utc::now(),
        )
        .unwrap();
        state.room.started = true;
        state.room.started_at = Some(Utc::now());
        state.game = Some(game);
        state
    }

    fn session_of(state: &RoomState, player_id: &str) -> SessionToken {
        state.player(player_id).unwrap().session.clone()
    }

    fn snapshot(state: &RoomState, viewer: Option<&SessionToken>) -> ViewerSnapshot {
        match project_game(state, viewer) {
            GameView::Started(snapshot) => *snapshot,
            GameView::NotStarted { .. } => panic!("expected a started game"),
        }
    }

    #[test]
    fn test_lobby_view() {
        let state = room_state(&["ada", "bea"]);
        let config = ServerConfig::default();
        let view = project_lobby(&state, Some(&SessionToken::from("s-bea")), &config);

        assert_eq!(view.players_count, 2);
        assert_eq!(view.host.as_deref(), Some("ada"));
        assert!(!view.host_is_me);
        assert!(view.is_member);
        assert!(view.can_start);
        assert!(view.players[0].is_host);
        assert!(view.players[1].is_me);
        assert_eq!(view.players[0].icon_display, "🦊 Volpe");
        assert_eq!(view.available_icons.len(), ICON_SET.len() - 2);
        assert!(view.available_icons.iter().all(|i| i.value != "volpe"));
        assert_eq!(view.join_url, "/rooms/ABC234/join");
    }

    #[test]
    fn test_lobby_view_anonymous() {
        let state = room_state(&["ada"]);
        let view = project_lobby(&state, None, &ServerConfig::default());
        assert!(!view.can_start);
        assert!(!view.is_member);
        assert!(!view.host_is_me);
        assert!(view.players.iter().all(|p| !p.is_me));
    }

    #[test]
    fn test_not_started() {
        let state = room_state(&["ada", "bea"]);
        assert!(matches!(
            project_game(&state, None),
            GameView::NotStarted { room } if room == "ABC234"
        ));
    }

    #[test]
    fn test_initial_snapshot() {
        let state = started(&["ada", "bea"], 1);
        let game = state.game.as_ref().unwrap();
        let current = game.current_player.clone().unwrap();
        let snap = snapshot(&state, Some(&session_of(&state, &current)));

        assert_eq!(snap.state, GameState::Choosing);
        assert_eq!(snap.remaining, 25);
        assert_eq!(snap.grid.cells.len(), 25);
        assert!(snap
            .grid
            .cells
            .iter()
            .all(|c| c.status == CellStatus::Available));
        assert!(snap.can_choose);
        assert!(!snap.can_answer);
        assert!(snap.current_player_is_me);
        assert!(snap.active_question.is_none());
        assert!(snap.last_answer.is_none());
        assert!(snap.winners.is_empty());
    }

    #[test]
    fn test_reveal_isolation() {
        let mut state = started(&["ada", "bea", "cai"], 2);
        let mut rng = StdRng::seed_from_u64(2);
        let game = state.game.as_mut().unwrap();
        let current = game.current_player.clone().unwrap();
        game.choose(&current, Cell::new(Category::Storia, 3), &mut rng, Utc::now())
            .unwrap();

        let mine = snapshot(&state, Some(&session_of(&state, &current)));
        let active = mine.active_question.unwrap();
        assert!(active.text.is_some());
        assert_eq!(active.options.unwrap().a, "right");
        assert!(mine.can_answer);
        assert!(!mine.can_choose);

        for other in state.players.iter().filter(|p| p.id != current) {
            let theirs = snapshot(&state, Some(&other.session));
            let active = theirs.active_question.unwrap();
            assert!(active.text.is_none());
            assert!(active.options.is_none());
            assert_eq!(active.level, 3);
            assert!(!theirs.can_answer);
            assert!(!theirs.can_choose);
        }

        // Spectators without a session see the same redacted view
        let anon = snapshot(&state, None);
        assert!(anon.active_question.unwrap().options.is_none());
        assert!(anon.me.is_none());

        let active_cell = mine
            .grid
            .cells
            .iter()
            .find(|c| c.category == Category::Storia && c.level == 3)
            .unwrap();
        assert_eq!(active_cell.status, CellStatus::Active);
    }

    #[test]
    fn test_redacted_view_never_serializes_options() {
        let mut state = started(&["ada", "bea"], 4);
        let mut rng = StdRng::seed_from_u64(4);
        let game = state.game.as_mut().unwrap();
        let current = game.current_player.clone().unwrap();
        game.choose(&current, Cell::new(Category::Arte, 1), &mut rng, Utc::now())
            .unwrap();

        let other = state.players.iter().find(|p| p.id != current).unwrap();
        let json = serde_json::to_string(&snapshot(&state, Some(&other.session))).unwrap();
        assert!(!json.contains("also wrong"));
        assert!(!json.contains("question level"));
    }

    #[test]
    fn test_asked_cell_and_last_answer() {
        let mut state = started(&["ada", "bea"], 3);
        let mut rng = StdRng::seed_from_u64(3);
        let game = state.game.as_mut().unwrap();
        let current = game.current_player.clone().unwrap();
        let cell = Cell::new(Category::Sport, 2);
        game.choose(&current, cell, &mut rng, Utc::now()).unwrap();
        game.answer(&current, AnswerOption::B, None, RotationPolicy::Always, Utc::now())
            .unwrap();

        let snap = snapshot(&state, None);
        let grid_cell = snap
            .grid
            .cells
            .iter()
            .find(|c| c.category == Category::Sport && c.level == 2)
            .unwrap();
        assert_eq!(grid_cell.status, CellStatus::Asked);
        assert_eq!(grid_cell.was_correct, Some(false));
        assert_eq!(grid_cell.selected_option, Some(AnswerOption::B));
        assert_eq!(grid_cell.player.as_deref(), Some(&current[2..]));

        let last = snap.last_answer.unwrap();
        assert!(!last.was_correct);
        assert_eq!(last.correct_option, AnswerOption::A);
        assert_eq!(last.correct_text, "right");
        assert_eq!(last.points_awarded, 0);
        assert_eq!(snap.remaining, 24);
    }

    #[test]
    fn test_scoreboard_order() {
        let mut state = started(&["bea", "Cai", "ada"], 5);
        let game = state.game.as_mut().unwrap();
        for gp in game.players.iter_mut() {
            gp.score = match gp.player_id.as_str() {
                "p-bea" => 4,
                "p-Cai" => 7,
                _ => 4,
            };
        }

        let snap = snapshot(&state, Some(&SessionToken::from("s-ada")));
        let names: Vec<&str> = snap.scoreboard.iter().map(|e| e.nickname.as_str()).collect();
        assert_eq!(names, vec!["Cai", "ada", "bea"]);
        assert!(snap.scoreboard[1].is_me);
        assert_eq!(snap.me.unwrap().score, 4);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let state = started(&["ada", "bea"], 6);
        let viewer = SessionToken::from("s-ada");
        let a = serde_json::to_value(snapshot(&state, Some(&viewer))).unwrap();
        let b = serde_json::to_value(snapshot(&state, Some(&viewer))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_winners_when_finished() {
        let mut state = started(&["ada", "bea"], 7);
        let game = state.game.as_mut().unwrap();
        game.state = GameState::Finished;
        game.current_turn = None;
        for gp in game.players.iter_mut() {
            gp.score = 10;
        }

        let snap = snapshot(&state, None);
        assert_eq!(snap.winners, vec!["ada".to_string(), "bea".to_string()]);
        assert!(!snap.can_choose);
        assert!(!snap.can_answer);
    }
}
