//! Host-only command handlers
//!
//! The host is whoever joined the room first; the state layer checks it
//! against the connection's session.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{RotationPolicy, SessionToken};
use std::sync::Arc;

pub async fn handle_start(
    state: &Arc<AppState>,
    code: &str,
    session: &SessionToken,
    rotation: Option<RotationPolicy>,
) -> Option<ServerMessage> {
    tracing::info!("Start requested for room {} (rotation {:?})", code, rotation);
    match state.start_game(code, session, rotation).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Start rejected in room {}: {}", code, e);
            Some(e.into())
        }
    }
}
