//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::RoomId,
    infrastructure::dto::{
        http::{ApiErrorDto, ConnectionDto, RoomConnectionsDto, StatsDto, SystemMessageRequest},
        websocket::MessageDto,
    },
    ui::state::AppState,
};

type ApiError = (StatusCode, Json<ApiErrorDto>);

fn bad_request(error: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorDto {
            error: error.to_string(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Live load of the broker
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsDto> {
    let stats = state.broker.stats().await;
    Json(StatsDto {
        connections: stats.connections,
        identified: stats.identified,
        rooms: stats.rooms,
        typing_rooms: stats.typing_rooms,
    })
}

/// Live members of a room
pub async fn get_room_connections(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomConnectionsDto>, ApiError> {
    let room_id = RoomId::new(room_id).map_err(bad_request)?;

    // Domain Model から DTO への変換
    let connections: Vec<ConnectionDto> = state
        .broker
        .room_connections(&room_id)
        .into_iter()
        .map(ConnectionDto::from)
        .collect();

    Ok(Json(RoomConnectionsDto {
        room_id: room_id.to_string(),
        connections,
    }))
}

/// Post a system message to a room, e.g. when a prediction resolves
pub async fn post_system_message(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<SystemMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let room_id = RoomId::new(room_id).map_err(bad_request)?;
    let message = state
        .pipeline
        .send_system_message(&room_id, request.body)
        .await
        .map_err(bad_request)?;

    Ok((StatusCode::CREATED, Json(MessageDto::from(message))))
}
