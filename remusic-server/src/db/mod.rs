//! Database access for remusic-server
//!
//! Every function takes the pool explicitly and issues independent,
//! immediately committed statements.

pub mod events;
pub mod scores;

pub use remusic_common::db::init_database;
