mod bank;
mod game;
mod room;

pub use bank::{
    parse_csv, BankLoadError, CellCoverage, CoverageReport, ImportReport, NumberedRow,
    QuestionBank, QuestionRow, RowError, REQUIRED_HEADERS,
};
pub use room::spawn_room_reaper;

use crate::broadcast::{RoomChannel, RoomEvent, ROOM_CHANNEL_CAPACITY};
use crate::config::ServerConfig;
use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};

/// Everything the engine knows about one room: identity, roster in join order,
/// and the current game (with all its children) once started.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub players: Vec<Player>,
    pub game: Option<Game>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            players: Vec::new(),
            game: None,
        }
    }

    /// The first player to join hosts the room
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn player_by_session(&self, session: &SessionToken) -> Option<&Player> {
        self.players.iter().find(|p| &p.session == session)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

/// A room's critical section plus its broadcast channel.
/// All mutations of one room are linearized by `lock()`; rooms never share a lock.
#[derive(Debug)]
pub struct RoomHandle {
    pub code: RoomCode,
    state: Mutex<RoomState>,
    channel: RoomChannel,
    /// Unix millis of creation or the last published change
    last_activity: AtomicI64,
}

impl RoomHandle {
    pub fn new(room: Room) -> Self {
        Self {
            code: room.code.clone(),
            last_activity: AtomicI64::new(room.created_at.timestamp_millis()),
            state: Mutex::new(RoomState::new(room)),
            channel: RoomChannel::new(ROOM_CHANNEL_CAPACITY),
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    /// Open connections watching this room
    pub fn watchers(&self) -> usize {
        self.channel.subscriber_count()
    }

    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.channel.subscribe()
    }

    pub fn publish(&self, event: RoomEvent) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        let reached = self.channel.publish(event.clone());
        tracing::debug!("Room {} event {:?} reached {} connections", self.code, event, reached);
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, Arc<RoomHandle>>>>,
    pub bank: Arc<RwLock<QuestionBank>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            bank: Arc::new(RwLock::new(QuestionBank::new())),
            config: Arc::new(config),
        }
    }

    /// Look up a room by its (case-insensitive) code
    pub async fn room(&self, code: &str) -> GameResult<Arc<RoomHandle>> {
        let code = normalize_code(code);
        self.rooms
            .read()
            .await
            .get(&code)
            .cloned()
            .ok_or(GameError::NotFound("Room"))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalize_code(code: &str) -> RoomCode {
    code.trim().to_uppercase()
}
