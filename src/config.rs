//! Server configuration loaded from the environment

use crate::auth::AdminAuth;
use crate::types::RotationPolicy;
use std::net::SocketAddr;
use std::time::Duration;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_PLAYERS: usize = 10;
pub const DEFAULT_MIN_PLAYERS: usize = 2;
pub const DEFAULT_ROOM_IDLE_MINUTES: u64 = 120;

/// Runtime settings for the game server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Absolute base for join links (e.g. "https://quiz.example.org"); relative links when None
    pub public_url: Option<String>,
    pub max_players: usize,
    pub min_players: usize,
    /// Applied to games whose start command doesn't pick a policy
    pub default_rotation: RotationPolicy,
    /// Question rows imported at startup (`.csv`, otherwise a JSON array)
    pub questions_path: Option<PathBuf>,
    pub secure_cookie: bool,
    pub static_dir: PathBuf,
    /// Guards question import and coverage
    pub admin: AdminAuth,
    /// Rooms nobody watches are dropped after this long without activity
    pub room_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            public_url: None,
            max_players: DEFAULT_MAX_PLAYERS,
            min_players: DEFAULT_MIN_PLAYERS,
            default_rotation: RotationPolicy::Always,
            questions_path: None,
            secure_cookie: false,
            static_dir: PathBuf::from("static"),
            admin: AdminAuth::default(),
            room_idle_timeout: Duration::from_secs(DEFAULT_ROOM_IDLE_MINUTES * 60),
        }
    }
}

impl ServerConfig {
    /// Load config from QUIZZZONE_* environment variables.
    /// Unparseable values are logged and fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rotation = match env_string("QUIZZZONE_ROTATION") {
            Some(raw) => RotationPolicy::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    "QUIZZZONE_ROTATION={} not recognised (expected 'always' or 'on_wrong'), using default",
                    raw
                );
                defaults.default_rotation
            }),
            None => defaults.default_rotation,
        };

        let max_players = env_parsed("QUIZZZONE_MAX_PLAYERS", defaults.max_players);
        let mut min_players = env_parsed("QUIZZZONE_MIN_PLAYERS", defaults.min_players);
        if min_players > max_players {
            tracing::warn!(
                "QUIZZZONE_MIN_PLAYERS ({}) exceeds QUIZZZONE_MAX_PLAYERS ({}), clamping",
                min_players,
                max_players
            );
            min_players = max_players;
        }

        Self {
            bind_addr: env_parsed("QUIZZZONE_BIND", defaults.bind_addr),
            public_url: env_string("QUIZZZONE_PUBLIC_URL").map(|s| s.trim_end_matches('/').to_string()),
            max_players,
            min_players,
            default_rotation: rotation,
            questions_path: env_string("QUIZZZONE_QUESTIONS").map(PathBuf::from),
            secure_cookie: env_parsed("QUIZZZONE_SECURE_COOKIE", defaults.secure_cookie),
            static_dir: env_string("QUIZZZONE_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            admin: AdminAuth::from_env(),
            room_idle_timeout: Duration::from_secs(
                env_parsed("QUIZZZONE_ROOM_IDLE_MINUTES", DEFAULT_ROOM_IDLE_MINUTES).max(1) * 60,
            ),
        }
    }

    /// Link a phone opens to join the room (rendered as a QR code by the UI)
    pub fn join_url(&self, code: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/rooms/{}/join", base, code),
            None => format!("/rooms/{}/join", code),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parsed<T: FromStr + std::fmt::Debug>(key: &str, default: T) -> T {
    match env_string(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{}={} is invalid, using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}
