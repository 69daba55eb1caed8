//! Shared utilities for Kaiwa: logging setup and clock abstraction.

pub mod logger;
pub mod time;
