use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("HTTP client error: {0}")]
    Client(reqwest::Error),
    #[error("Malformed request: {0}")]
    Request(reqwest::Error),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Insufficient data: at least one record is required")]
    InsufficientData,
}

pub type Result<T> = std::result::Result<T, Error>;
