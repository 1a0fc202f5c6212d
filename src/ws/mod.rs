pub mod handlers;
pub mod host;
pub mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    Extension,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::RoomEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::SessionToken;

/// Which snapshot a connection is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Lobby,
    Game,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub view: ViewKind,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Query(params): Query<WsQuery>,
    Extension(session): Extension<SessionToken>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: room={}, view={:?}",
        code,
        params.view
    );

    ws.on_upgrade(move |socket| handle_socket(socket, code, params.view, session, state))
}

/// Snapshot for this viewer, computed now from the current room state
pub async fn snapshot(
    state: &AppState,
    code: &str,
    session: &SessionToken,
    view: ViewKind,
) -> ServerMessage {
    let result: Result<ServerMessage, _> = match view {
        ViewKind::Lobby => state.lobby_view(code, Some(session)).await.map(Into::into),
        ViewKind::Game => state.game_view(code, Some(session)).await.map(Into::into),
    };
    result.unwrap_or_else(|_| ServerMessage::NotFound)
}

/// What a connection pushes after its room subscription yields.
/// Events and lag both produce a fresh full snapshot; a closed channel ends the connection.
pub async fn push_for_event(
    event: Result<RoomEvent, RecvError>,
    state: &AppState,
    code: &str,
    session: &SessionToken,
    view: ViewKind,
) -> Option<ServerMessage> {
    match event {
        Ok(event) => {
            tracing::debug!("Room {} event {:?}, refreshing snapshot", code, event);
        }
        Err(RecvError::Lagged(skipped)) => {
            tracing::debug!("Connection lagged by {} events, resyncing", skipped);
        }
        Err(RecvError::Closed) => return None,
    }
    Some(snapshot(state, code, session, view).await)
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    code: String,
    view: ViewKind,
    session: SessionToken,
    state: Arc<AppState>,
) {
    let (mut sender, mut receiver) = socket.split();

    let handle = match state.room(&code).await {
        Ok(handle) => handle,
        Err(_) => {
            tracing::warn!("WebSocket for unknown room {}", code);
            let _ = send_json(&mut sender, &ServerMessage::NotFound).await;
            return;
        }
    };

    // Subscribe before the first snapshot so no change slips in between
    let mut events = handle.subscribe();
    let code = handle.code.clone();

    if !send_json(&mut sender, &snapshot(&state, &code, &session, view).await).await {
        tracing::error!("Failed to send initial snapshot");
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                // Full snapshot, so coalesced or reordered events self-correct
                let Some(push) = push_for_event(event, &state, &code, &session, view).await else {
                    break;
                };
                if !send_json(&mut sender, &push).await {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        if text.trim().eq_ignore_ascii_case("ping") {
                            if !send_json(&mut sender, &snapshot(&state, &code, &session, view).await).await {
                                break;
                            }
                            continue;
                        }

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => Some(snapshot(&state, &code, &session, view).await),
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &code, &session, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(reply) = reply {
                            if !send_json(&mut sender, &reply).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for room {}", code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ROOM_CHANNEL_CAPACITY;
    use crate::state::tests::state_with_bank;

    #[tokio::test]
    async fn test_snapshot_for_unknown_room() {
        let state = AppState::new();
        let msg = snapshot(&state, "NOPE22", &SessionToken::from("a"), ViewKind::Game).await;
        assert!(matches!(msg, ServerMessage::NotFound));
    }

    #[tokio::test]
    async fn test_snapshot_kinds() {
        let state = AppState::new();
        let room = state.create_room().await;
        let session = SessionToken::from("a");

        let lobby = snapshot(&state, &room.code, &session, ViewKind::Lobby).await;
        assert!(matches!(lobby, ServerMessage::RoomState(_)));

        let game = snapshot(&state, &room.code, &session, ViewKind::Game).await;
        assert!(matches!(game, ServerMessage::NotStarted { .. }));
    }

    fn options_of(msg: &ServerMessage) -> Option<crate::projector::QuestionOptions> {
        match msg {
            ServerMessage::GameState(snapshot) => snapshot
                .active_question
                .as_ref()
                .and_then(|q| q.options.clone()),
            other => panic!("Expected game_state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pushes_are_per_viewer() {
        let state = state_with_bank().await;
        let room = state.create_room().await;
        let ada = SessionToken::from("ada");
        let bea = SessionToken::from("bea");
        state.join_room(&room.code, &ada, "Ada", "volpe").await.unwrap();
        state.join_room(&room.code, &bea, "Bea", "gatto").await.unwrap();
        state.start_game(&room.code, &ada, None).await.unwrap();

        let handle = state.room(&room.code).await.unwrap();
        let current = {
            let guard = handle.lock().await;
            let id = guard.game.as_ref().unwrap().current_player.clone().unwrap();
            guard.player(&id).unwrap().session.clone()
        };
        let other = if current == ada { bea.clone() } else { ada.clone() };

        let mut chooser_events = handle.subscribe();
        let mut watcher_events = handle.subscribe();
        state
            .choose_question(&room.code, &current, "storia", 3)
            .await
            .unwrap();

        let event = chooser_events.recv().await;
        let push = push_for_event(event, &state, &room.code, &current, ViewKind::Game)
            .await
            .unwrap();
        let options = options_of(&push).expect("chooser sees the options");
        assert_eq!(options.a, "right");

        let event = watcher_events.recv().await;
        let push = push_for_event(event, &state, &room.code, &other, ViewKind::Game)
            .await
            .unwrap();
        assert!(options_of(&push).is_none());
        let json = serde_json::to_string(&push).unwrap();
        assert!(!json.contains("right"));
    }

    #[tokio::test]
    async fn test_lagged_connection_gets_full_snapshot() {
        let state = state_with_bank().await;
        let room = state.create_room().await;
        let ada = SessionToken::from("ada");
        state.join_room(&room.code, &ada, "Ada", "volpe").await.unwrap();

        let handle = state.room(&room.code).await.unwrap();
        let mut slow = handle.subscribe();
        for _ in 0..ROOM_CHANNEL_CAPACITY + 5 {
            handle.publish(RoomEvent::RosterChanged);
        }

        let event = slow.recv().await;
        assert!(matches!(event, Err(RecvError::Lagged(_))));
        let push = push_for_event(event, &state, &room.code, &ada, ViewKind::Lobby)
            .await
            .unwrap();
        match push {
            ServerMessage::RoomState(view) => {
                assert_eq!(view.players_count, 1);
                assert!(view.is_member);
            }
            other => panic!("Expected room_state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_ends_pushes() {
        let state = AppState::new();
        let push = push_for_event(
            Err(RecvError::Closed),
            &state,
            "NOPE22",
            &SessionToken::from("a"),
            ViewKind::Lobby,
        )
        .await;
        assert!(push.is_none());
    }

    #[test]
    fn test_view_query() {
        let q: WsQuery = serde_json::from_str(r#"{"view":"game"}"#).unwrap();
        assert_eq!(q.view, ViewKind::Game);
        let q: WsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.view, ViewKind::Lobby);
    }
}
