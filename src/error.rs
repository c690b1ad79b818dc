use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameters:\n  {}", .0.join("\n  "))]
    InvalidParameters(Vec<String>),
    #[error("Pre-flight check failed: {0}")]
    PreflightFailed(String),
    #[error(transparent)]
    Core(#[from] stress_core::Error),
    #[error(transparent)]
    Storage(#[from] stress_storage::Error),
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}
