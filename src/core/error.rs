use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persist(String),
}

impl From<reqwest::Error> for CompanionError {
    fn from(e: reqwest::Error) -> Self {
        CompanionError::Generation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompanionError>;
