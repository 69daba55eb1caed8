//! Data Transfer Objects (DTOs) for the room broker.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket event frames (client → server and server → client)
//! - `http`: HTTP API request/response bodies
//! - `conversion`: Domain entity → DTO conversions

pub mod conversion;
pub mod http;
pub mod websocket;
