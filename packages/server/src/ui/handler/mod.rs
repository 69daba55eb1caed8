//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{get_room_connections, get_stats, health_check, post_system_message};
pub use websocket::websocket_handler;
