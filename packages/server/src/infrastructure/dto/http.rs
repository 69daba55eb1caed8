//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

/// `GET /api/stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    /// Open WebSocket connections (identified or not)
    pub connections: usize,
    /// Connections that have claimed an identity
    pub identified: usize,
    /// Rooms with at least one member
    pub rooms: usize,
    /// Rooms with at least one typing member
    pub typing_rooms: usize,
}

/// `GET /api/rooms/{room_id}/connections`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConnectionsDto {
    pub room_id: String,
    pub connections: Vec<ConnectionDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
    /// RFC 3339
    pub joined_at: String,
}

/// `POST /api/rooms/{room_id}/system-messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessageRequest {
    pub body: String,
}

/// Error body of the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDto {
    pub error: String,
}
