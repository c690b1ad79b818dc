#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Stored record is invalid: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for stress_core::Error {
    fn from(e: Error) -> Self {
        stress_core::Error::Storage(e.to_string())
    }
}
