//! WebSocket connection handlers.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, ConnectionRequest, DisplayName, Identity, RoomId, UserId},
    infrastructure::dto::{
        http::ApiErrorDto,
        websocket::{
            AddReactionPayload, ClientEvent, ErrorCode, IdentityClaimPayload, PongPayload,
            RoomPayload, SendMessagePayload, ServerEvent,
        },
    },
    ui::state::AppState,
    usecase::{AdmitError, JoinError, LeaveError, ReactError, SendMessageError, TypingError},
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let request = connection_request(&headers, peer);
    let decision = state.access_gate.check(&request);
    if !decision.is_admitted() {
        let body = ApiErrorDto {
            error: decision.reason().to_string(),
        };
        return (StatusCode::FORBIDDEN, Json(body)).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn connection_request(headers: &HeaderMap, peer: SocketAddr) -> ConnectionRequest {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    // Behind a proxy the first X-Forwarded-For entry is the client.
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    ConnectionRequest {
        origin: header_value(header::ORIGIN),
        user_agent: header_value(header::USER_AGENT),
        remote_addr: Some(forwarded_for.unwrap_or_else(|| peer.to_string())),
    }
}

/// Spawns a task that receives frames from the rx channel and pushes them to the WebSocket sender.
///
/// The task ends when the channel is closed (the connection was unregistered)
/// or the socket refuses a frame.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();
    state.broker.connect(connection_id.clone(), tx).await;

    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);

    // The receive loop runs inline so that leaving the select drops it on the spot.
    tokio::select! {
        _ = receive_loop(&state, &connection_id, &mut receiver) => {},
        _ = &mut send_task => {},
        _ = state.shutdown.cancelled() => {
            tracing::debug!("Closing connection '{}' for shutdown", connection_id);
        },
    }
    send_task.abort();

    state.broker.disconnect(&connection_id).await;
}

async fn receive_loop(
    state: &AppState,
    connection_id: &ConnectionId,
    receiver: &mut SplitStream<WebSocket>,
) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("WebSocket error on '{}': {}", connection_id, e);
                break;
            }
        };

        match msg {
            Message::Text(text) => dispatch(state, connection_id, text.as_str()).await,
            Message::Binary(_) => {
                let event =
                    ServerEvent::error(ErrorCode::InvalidEvent, "binary frames are not supported");
                reply(state, connection_id, &event).await;
            }
            Message::Close(_) => {
                tracing::info!("Connection '{}' requested close", connection_id);
                break;
            }
            // Ping/pong frames are answered by the WebSocket layer
            _ => {}
        }
    }
}

/// Route one client frame to its use case.
///
/// A failing event yields a private `error` / `auth-error`; the connection stays open.
async fn dispatch(state: &AppState, connection_id: &ConnectionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Unparseable frame from '{}': {}", connection_id, e);
            let event =
                ServerEvent::error(ErrorCode::InvalidEvent, format!("invalid event: {}", e));
            reply(state, connection_id, &event).await;
            return;
        }
    };
    tracing::debug!("'{}' -> {}", connection_id, event.name());

    let result = match event {
        ClientEvent::Ping => on_ping(state, connection_id).await,
        ClientEvent::IdentityClaim(payload) => {
            on_identity_claim(state, connection_id, payload).await
        }
        _ if state.broker.connection(connection_id).is_none() => Err(ServerEvent::auth_error(
            ErrorCode::NotAuthenticated,
            "claim an identity before using the room",
        )),
        ClientEvent::JoinRoom(payload) => on_join_room(state, connection_id, payload).await,
        ClientEvent::LeaveRoom(payload) => on_leave_room(state, connection_id, payload).await,
        ClientEvent::SendMessage(payload) => on_send_message(state, connection_id, payload).await,
        ClientEvent::TypingStart(payload) => on_typing(state, connection_id, payload, true).await,
        ClientEvent::TypingStop(payload) => on_typing(state, connection_id, payload, false).await,
        ClientEvent::AddReaction(payload) => on_add_reaction(state, connection_id, payload).await,
    };

    if let Err(event) = result {
        reply(state, connection_id, &event).await;
    }
}

async fn reply(state: &AppState, connection_id: &ConnectionId, event: &ServerEvent) {
    if let Err(e) = state.broker.push_to(connection_id, event).await {
        tracing::warn!("Failed to reply to '{}': {}", connection_id, e);
    }
}

async fn on_ping(state: &AppState, connection_id: &ConnectionId) -> Result<(), ServerEvent> {
    let pong = ServerEvent::Pong(PongPayload {
        timestamp: state.broker.server_time(),
    });
    reply(state, connection_id, &pong).await;
    Ok(())
}

async fn on_identity_claim(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: IdentityClaimPayload,
) -> Result<(), ServerEvent> {
    let invalid = |e: crate::domain::ValueObjectError| {
        ServerEvent::auth_error(ErrorCode::InvalidIdentity, e.to_string())
    };
    let user_id = UserId::new(payload.user_id).map_err(invalid)?;
    let display_name = DisplayName::new(payload.display_name).map_err(invalid)?;
    let avatar = payload
        .avatar
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    state
        .broker
        .admit(connection_id, Identity::new(user_id, display_name, avatar))
        .await?;
    Ok(())
}

async fn on_join_room(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: RoomPayload,
) -> Result<(), ServerEvent> {
    let room_id = parse_room(payload.room_id)?;
    state.broker.join(connection_id, room_id).await?;
    Ok(())
}

async fn on_leave_room(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: RoomPayload,
) -> Result<(), ServerEvent> {
    let room_id = parse_room(payload.room_id)?;
    state.broker.leave(connection_id, &room_id).await?;
    Ok(())
}

async fn on_send_message(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: SendMessagePayload,
) -> Result<(), ServerEvent> {
    let room_id = parse_room(payload.room_id)?;
    state
        .pipeline
        .send(connection_id, &room_id, payload.body)
        .await?;
    Ok(())
}

async fn on_typing(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: RoomPayload,
    typing: bool,
) -> Result<(), ServerEvent> {
    let room_id = parse_room(payload.room_id)?;
    if typing {
        state.pipeline.typing_start(connection_id, &room_id).await?;
    } else {
        state.pipeline.typing_stop(connection_id, &room_id).await?;
    }
    Ok(())
}

async fn on_add_reaction(
    state: &AppState,
    connection_id: &ConnectionId,
    payload: AddReactionPayload,
) -> Result<(), ServerEvent> {
    state
        .pipeline
        .react(connection_id, payload.message_id, payload.kind)
        .await?;
    Ok(())
}

fn parse_room(raw: String) -> Result<RoomId, ServerEvent> {
    RoomId::new(raw).map_err(|e| ServerEvent::error(ErrorCode::InvalidRoom, e.to_string()))
}

fn not_authenticated(message: String) -> ServerEvent {
    ServerEvent::auth_error(ErrorCode::NotAuthenticated, message)
}

// ========================================
// UseCase error → wire error
// ========================================

impl From<AdmitError> for ServerEvent {
    fn from(e: AdmitError) -> Self {
        let code = match e {
            AdmitError::AlreadyAuthenticated => ErrorCode::AlreadyAuthenticated,
            AdmitError::DuplicateIdentity(_) => ErrorCode::DuplicateIdentity,
        };
        ServerEvent::auth_error(code, e.to_string())
    }
}

impl From<JoinError> for ServerEvent {
    fn from(e: JoinError) -> Self {
        match e {
            JoinError::NotAuthenticated => not_authenticated(e.to_string()),
        }
    }
}

impl From<LeaveError> for ServerEvent {
    fn from(e: LeaveError) -> Self {
        match e {
            LeaveError::NotAuthenticated => not_authenticated(e.to_string()),
            LeaveError::NotInRoom(_) => ServerEvent::error(ErrorCode::NotInRoom, e.to_string()),
        }
    }
}

impl From<SendMessageError> for ServerEvent {
    fn from(e: SendMessageError) -> Self {
        let code = match e {
            SendMessageError::NotAuthenticated => return not_authenticated(e.to_string()),
            SendMessageError::NotInRoom(_) => ErrorCode::NotInRoom,
            SendMessageError::EmptyBody => ErrorCode::EmptyBody,
            SendMessageError::BodyTooLong { .. } => ErrorCode::BodyTooLong,
        };
        ServerEvent::error(code, e.to_string())
    }
}

impl From<ReactError> for ServerEvent {
    fn from(e: ReactError) -> Self {
        let code = match e {
            ReactError::NotAuthenticated => return not_authenticated(e.to_string()),
            ReactError::InvalidReaction(_) | ReactError::MessageNotFound(_) => {
                ErrorCode::InvalidReaction
            }
            ReactError::Store(_) => ErrorCode::ReactionFailed,
        };
        ServerEvent::error(code, e.to_string())
    }
}

impl From<TypingError> for ServerEvent {
    fn from(e: TypingError) -> Self {
        match e {
            TypingError::NotAuthenticated => not_authenticated(e.to_string()),
            TypingError::NotInRoom(_) => ServerEvent::error(ErrorCode::NotInRoom, e.to_string()),
        }
    }
}
