//! Infrastructure layer.
//!
//! Concrete implementations of the domain traits plus the wire DTOs.

pub mod dto;
pub mod message_pusher;
pub mod registry;
pub mod store;
pub mod typing_tracker;
