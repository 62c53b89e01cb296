use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Drift detected at {path}: expected content {expected}, found {found}")]
    Drift {
        path: String,
        expected: String,
        found: String,
    },

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("No file to commit against: {0}")]
    MissingTarget(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
