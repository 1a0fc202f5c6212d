use crate::types::Cell;

pub type GameResult<T> = Result<T, GameError>;

/// Structured rejection of a room or game command. A rejected command leaves state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("It is not your turn")]
    NotYourTurn,

    #[error("This question has already been answered")]
    AlreadyAnswered,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("The room is full (max {max} players)")]
    RoomFull { max: usize },

    #[error("Nickname '{0}' is already taken in this room")]
    NicknameTaken(String),

    #[error("Icon '{0}' has already been chosen")]
    IconTaken(String),

    #[error("The game in this room has already started")]
    RoomAlreadyStarted,

    #[error("The question bank is incomplete, missing: {}", format_cells(.missing))]
    IncompleteBank { missing: Vec<Cell> },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Only the host can start the game")]
    NotHost,

    #[error("At least {required} players are needed to start (currently {actual})")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GameError {
    /// Stable wire code
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::AlreadyAnswered => "ALREADY_ANSWERED",
            GameError::InvalidSelection(_) => "INVALID_SELECTION",
            GameError::RoomFull { .. } => "ROOM_FULL",
            GameError::NicknameTaken(_) => "NICKNAME_TAKEN",
            GameError::IconTaken(_) => "ICON_TAKEN",
            GameError::RoomAlreadyStarted => "ROOM_ALREADY_STARTED",
            GameError::IncompleteBank { .. } => "INCOMPLETE_BANK",
            GameError::NotFound(_) => "NOT_FOUND",
            GameError::NotHost => "NOT_HOST",
            GameError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            GameError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

fn format_cells(cells: &[Cell]) -> String {
    cells
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn test_incomplete_bank_lists_every_cell() {
        let err = GameError::IncompleteBank {
            missing: vec![
                Cell::new(Category::Sport, 5),
                Cell::new(Category::Arte, 1),
            ],
        };
        assert_eq!(err.code(), "INCOMPLETE_BANK");
        let msg = err.to_string();
        assert!(msg.contains("(sport, 5)"));
        assert!(msg.contains("(arte, 1)"));
    }
}
