use crate::types::Cell;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered events per room before slow subscribers start lagging
pub const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Room-scoped change notification. Carries no state: every subscriber
/// recomputes its own snapshot when it receives one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomEvent {
    RosterChanged,
    GameStarted,
    QuestionChosen { cell: Cell },
    AnswerResolved { cell: Cell, was_correct: bool },
    GameFinished,
}

/// Fan-out of room events to every connection watching the room
#[derive(Debug)]
pub struct RoomChannel {
    tx: broadcast::Sender<RoomEvent>,
}

impl RoomChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    /// Notify subscribers; returns how many were reached.
    /// Having nobody connected is fine and never fails the mutation.
    pub fn publish(&self, event: RoomEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RoomChannel {
    fn default() -> Self {
        Self::new(ROOM_CHANNEL_CAPACITY)
    }
}
