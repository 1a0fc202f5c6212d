//! Room lifecycle and roster: create, join, leave, and eviction of idle rooms

use super::{AppState, RoomHandle};
use crate::broadcast::RoomEvent;
use crate::error::{GameError, GameResult};
use crate::projector::{self, LobbyView};
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Room code alphabet (no 0/O, 1/I)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
pub const MAX_NICKNAME_CHARS: usize = 20;

fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

fn validate_nickname(raw: &str) -> GameResult<String> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(GameError::InvalidInput("choose a nickname".to_string()));
    }
    if nickname.chars().count() > MAX_NICKNAME_CHARS {
        return Err(GameError::InvalidInput(format!(
            "nickname must be at most {} characters",
            MAX_NICKNAME_CHARS
        )));
    }
    Ok(nickname.to_string())
}

/// How often the reaper looks for idle rooms
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drop rooms that went idle with nobody watching
pub fn spawn_room_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(REAP_INTERVAL).await;
            let evicted = state.evict_idle_rooms(Utc::now()).await;
            if evicted > 0 {
                tracing::info!("Evicted {} idle rooms", evicted);
            }
        }
    });
}

impl AppState {
    /// Remove rooms with no open connection whose last change is older than
    /// the configured idle timeout. Returns how many were removed.
    pub async fn evict_idle_rooms(&self, now: DateTime<Utc>) -> usize {
        let idle_ms = i64::try_from(self.config.room_idle_timeout.as_millis()).unwrap_or(i64::MAX);
        let now_ms = now.timestamp_millis();

        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|code, handle| {
            let idle = now_ms.saturating_sub(handle.last_activity().timestamp_millis()) >= idle_ms;
            let evict = idle && handle.watchers() == 0;
            if evict {
                tracing::debug!("Evicting idle room {}", code);
            }
            !evict
        });
        before - rooms.len()
    }

    /// Create a new empty room with a unique code
    pub async fn create_room(&self) -> Room {
        let mut rooms = self.rooms.write().await;

        let code = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let room = Room {
            code: code.clone(),
            created_at: chrono::Utc::now(),
            started: false,
            started_at: None,
        };
        rooms.insert(code.clone(), Arc::new(RoomHandle::new(room.clone())));

        tracing::info!("Created room {}", code);
        room
    }

    /// Add the session's player to the room.
    /// A session that already joined gets its existing player back unchanged.
    pub async fn join_room(
        &self,
        code: &str,
        session: &SessionToken,
        nickname: &str,
        icon: &str,
    ) -> GameResult<Player> {
        let handle = self.room(code).await?;
        let mut room = handle.lock().await;

        if let Some(existing) = room.player_by_session(session) {
            return Ok(existing.clone());
        }
        if room.room.started {
            return Err(GameError::RoomAlreadyStarted);
        }
        if room.players.len() >= self.config.max_players {
            return Err(GameError::RoomFull {
                max: self.config.max_players,
            });
        }

        let nickname = validate_nickname(nickname)?;
        let icon = icon.trim();
        if !is_known_icon(icon) {
            return Err(GameError::InvalidInput(format!("unknown icon '{}'", icon)));
        }

        let lowered = nickname.to_lowercase();
        if room
            .players
            .iter()
            .any(|p| p.nickname.to_lowercase() == lowered)
        {
            return Err(GameError::NicknameTaken(nickname));
        }
        if room.players.iter().any(|p| p.icon == icon) {
            return Err(GameError::IconTaken(icon.to_string()));
        }

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            nickname,
            icon: icon.to_string(),
            session: session.clone(),
            joined_at: chrono::Utc::now(),
        };
        room.players.push(player.clone());
        drop(room);

        tracing::info!(
            "{} joined room {} as {}",
            player.nickname,
            handle.code,
            player.icon
        );
        handle.publish(RoomEvent::RosterChanged);
        Ok(player)
    }

    /// Remove the session's player. Only allowed before the game starts.
    pub async fn leave_room(&self, code: &str, session: &SessionToken) -> GameResult<Player> {
        let handle = self.room(code).await?;
        let mut room = handle.lock().await;

        if room.room.started {
            return Err(GameError::RoomAlreadyStarted);
        }
        let position = room
            .players
            .iter()
            .position(|p| &p.session == session)
            .ok_or(GameError::NotFound("Player"))?;
        let player = room.players.remove(position);
        drop(room);

        tracing::info!("{} left room {}", player.nickname, handle.code);
        handle.publish(RoomEvent::RosterChanged);
        Ok(player)
    }

    /// Lobby view of the room for one viewer
    pub async fn lobby_view(
        &self,
        code: &str,
        viewer: Option<&SessionToken>,
    ) -> GameResult<LobbyView> {
        let handle = self.room(code).await?;
        let room = handle.lock().await;
        Ok(projector::project_lobby(&room, viewer, &self.config))
    }
}
