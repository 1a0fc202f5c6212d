use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type QuestionId = String;
pub type GameId = String;
pub type TurnId = String;

/// Opaque per-browser identity (session cookie value). Never derived from a nickname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ========== Question Bank ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Storia,
    Geografia,
    Scienza,
    Sport,
    Arte,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Storia,
        Category::Geografia,
        Category::Scienza,
        Category::Sport,
        Category::Arte,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Storia => "storia",
            Category::Geografia => "geografia",
            Category::Scienza => "scienza",
            Category::Sport => "sport",
            Category::Arte => "arte",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Storia => "Storia",
            Category::Geografia => "Geografia",
            Category::Scienza => "Scienza",
            Category::Sport => "Sport",
            Category::Arte => "Arte",
        }
    }

    /// Case-insensitive lookup of the wire name
    pub fn parse(value: &str) -> Option<Category> {
        let value = value.trim().to_lowercase();
        Category::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const LEVELS: std::ops::RangeInclusive<u8> = MIN_LEVEL..=MAX_LEVEL;

/// One (category, difficulty) square of the 5x5 board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub category: Category,
    pub level: u8,
}

impl Cell {
    pub fn new(category: Category, level: u8) -> Self {
        Self { category, level }
    }

    /// All 25 cells, category-major then ascending level
    pub fn all() -> Vec<Cell> {
        Category::ALL
            .iter()
            .flat_map(|&category| LEVELS.map(move |level| Cell { category, level }))
            .collect()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 3] = [AnswerOption::A, AnswerOption::B, AnswerOption::C];

    pub fn parse(value: &str) -> Option<AnswerOption> {
        match value.trim().to_uppercase().as_str() {
            "A" => Some(AnswerOption::A),
            "B" => Some(AnswerOption::B),
            "C" => Some(AnswerOption::C),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub category: Category,
    pub difficulty: u8,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct_option: AnswerOption,
    pub is_active: bool,
}

impl Question {
    pub fn cell(&self) -> Cell {
        Cell::new(self.category, self.difficulty)
    }

    pub fn option_text(&self, option: AnswerOption) -> &str {
        match option {
            AnswerOption::A => &self.option_a,
            AnswerOption::B => &self.option_b,
            AnswerOption::C => &self.option_c,
        }
    }
}

// ========== Rooms & Players ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub created_at: DateTime<Utc>,
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub icon: String,
    pub session: SessionToken,
    pub joined_at: DateTime<Utc>,
}

/// Selectable avatar: (value, emoji, label)
pub const ICON_SET: &[(&str, &str, &str)] = &[
    ("volpe", "🦊", "Volpe"),
    ("gatto", "🐱", "Gatto"),
    ("cane", "🐶", "Cane"),
    ("gufo", "🦉", "Gufo"),
    ("panda", "🐼", "Panda"),
    ("lama", "🦙", "Lama"),
    ("robot", "🤖", "Robot"),
    ("delfino", "🐬", "Delfino"),
    ("fenice", "🐦", "Fenice"),
    ("drago", "🐉", "Drago"),
    ("ninja", "🥷", "Ninja"),
    ("razzo", "🚀", "Razzo"),
];

/// "🦊 Volpe" style label, or the raw value for unknown icons
pub fn icon_display(icon: &str) -> String {
    ICON_SET
        .iter()
        .find(|(value, _, _)| *value == icon)
        .map(|(_, emoji, label)| format!("{} {}", emoji, label))
        .unwrap_or_else(|| icon.to_string())
}

pub fn is_known_icon(icon: &str) -> bool {
    ICON_SET.iter().any(|(value, _, _)| *value == icon)
}

// ========== Game ==========

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Choosing,
    Answering,
    Finished,
}

/// When the turn passes to the next player in join order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Every resolved answer hands the turn on
    #[default]
    Always,
    /// A correct answer keeps the turn with the same player
    #[serde(alias = "on_wrong", alias = "wrong")]
    OnWrongOnly,
}

impl RotationPolicy {
    pub fn rotates_after(&self, was_correct: bool) -> bool {
        match self {
            RotationPolicy::Always => true,
            RotationPolicy::OnWrongOnly => !was_correct,
        }
    }

    pub fn parse(value: &str) -> Option<RotationPolicy> {
        match value.trim().to_lowercase().as_str() {
            "always" => Some(RotationPolicy::Always),
            "on_wrong" | "on_wrong_only" | "wrong" => Some(RotationPolicy::OnWrongOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameQuestion {
    pub cell: Cell,
    pub question: Question,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayer {
    pub player_id: PlayerId,
    pub order: usize,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTurn {
    pub id: TurnId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub cell: Cell,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub selected_option: Option<AnswerOption>,
    pub was_correct: Option<bool>,
    pub points_awarded: u32,
}

impl GameTurn {
    pub fn is_answered(&self) -> bool {
        self.selected_option.is_some()
    }
}

/// A started room's game. Owns its questions, per-game roster and turns;
/// replacing the Game drops all of them together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub state: GameState,
    pub rotation: RotationPolicy,
    pub current_player: Option<PlayerId>,
    pub current_turn: Option<TurnId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub questions: Vec<GameQuestion>,
    pub players: Vec<GamePlayer>,
    pub turns: Vec<GameTurn>,
}
