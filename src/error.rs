//! Custom error types for isnad

use thiserror::Error;

/// Main error type for isnad operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("Not initialized: run 'isnad init' first")]
    NotInitialized,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Transient upstream failure after {attempts} attempts: {reason}")]
    Transient { attempts: u32, reason: String },

    #[error("Rejected payload: {0}")]
    Rejected(String),

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Invalid search query: {0}")]
    Search(String),
}

/// Result type alias for isnad
pub type Result<T> = std::result::Result<T, Error>;
