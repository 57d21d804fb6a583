use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Destination already registered: {0}")]
    DuplicateDestination(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
