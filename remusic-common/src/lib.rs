//! # ReMusic Common Library
//!
//! Shared code for the ReMusic server and its tooling:
//! - Database initialization and score/event models
//! - Configuration loading (TOML bootstrap file + defaults)
//! - Common error type
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use db::models::{EventKind, Score, ScoreEvent, ScoreStatus};
pub use error::{Error, Result};
