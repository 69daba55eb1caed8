//! Kaiwa: real-time room broker for per-prediction discussion.
//!
//! Layers follow the usual split: `domain` (value objects, entities, traits),
//! `infrastructure` (in-memory implementations and wire DTOs), `usecase`
//! (broker, message pipeline, presence sweep) and `ui` (axum server).

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
