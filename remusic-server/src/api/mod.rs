//! HTTP API handlers for remusic-server

pub mod health;
pub mod scores;
pub mod upload;

pub use health::health_routes;
pub use scores::score_routes;
