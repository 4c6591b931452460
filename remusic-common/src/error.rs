//! Error type shared by the ReMusic crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file missing, unreadable, or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored column holds a value the models do not know
    #[error("Invalid {column} in database: {value}")]
    InvalidRecord { column: &'static str, value: String },
}
