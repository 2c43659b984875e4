//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{LobbyCommand, LobbyError, LobbyHandle, LobbyRegistry};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::session::SessionHandle;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (session, frame_rx) = SessionHandle::new(player_id);

    run_session(player_id, session, ws_sink, ws_stream, frame_rx, &state.lobbies).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    session: SessionHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut frame_rx: mpsc::Receiver<String>,
    lobbies: &LobbyRegistry,
) {
    let rate_limiter = SessionRateLimiter::new();

    // Writer task: queued frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame)).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut lobby: Option<LobbyHandle> = None;

    // Reader loop: WebSocket -> lobby
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_inbound() {
                    warn!(player_id = %player_id, "Rate limited client message");
                    continue;
                }

                let msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(player_id = %player_id, error = %e, "Dropping malformed client message");
                        continue;
                    }
                };

                if let Err(e) = route_message(player_id, msg, &session, &mut lobby, lobbies).await {
                    warn!(player_id = %player_id, error = %e, "Lobby unavailable");
                    send_error(&session, "Lobby closed");
                    lobby = None;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the lobby
    if let Some(lobby) = lobby {
        let _ = lobby.leave(player_id).await;
    }

    writer_handle.abort();
}

/// Create/join are handled here; everything else goes to the joined lobby
async fn route_message(
    player_id: Uuid,
    msg: ClientMsg,
    session: &SessionHandle,
    lobby: &mut Option<LobbyHandle>,
    lobbies: &LobbyRegistry,
) -> Result<(), LobbyError> {
    match msg {
        ClientMsg::CreateLobby { username } => {
            leave_current(player_id, lobby).await;
            let handle = lobbies.create();
            handle.join(player_id, username, session.clone()).await?;
            *lobby = Some(handle);
        }
        ClientMsg::JoinLobby { username, lobby_id } => match lobbies.lookup(&lobby_id) {
            Ok(handle) => {
                leave_current(player_id, lobby).await;
                handle.join(player_id, username, session.clone()).await?;
                *lobby = Some(handle);
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "Join rejected");
                send_error(session, "Lobby not found");
            }
        },
        msg => match lobby {
            Some(handle) => handle.send(LobbyCommand::Client { player_id, msg }).await?,
            None => debug!(player_id = %player_id, "Message before joining a lobby"),
        },
    }
    Ok(())
}

async fn leave_current(player_id: Uuid, lobby: &mut Option<LobbyHandle>) {
    if let Some(previous) = lobby.take() {
        let _ = previous.leave(player_id).await;
    }
}

fn send_error(session: &SessionHandle, message: &str) {
    if let Ok(frame) = serde_json::to_string(&ServerMsg::error(message)) {
        session.send(frame);
    }
}
