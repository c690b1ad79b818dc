use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer code stored and reported for a request that never got a response.
pub const TRANSPORT_FAILURE_CODE: i32 = -1;

/// Outcome of a single request.
///
/// `TransportFailure` sorts before every HTTP status so ordered maps list it
/// first, the same way its `-1` code would sort.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum Status {
    TransportFailure,
    Http(u16),
}

impl Status {
    pub const OK: Status = Status::Http(200);

    pub fn code(self) -> i32 {
        match self {
            Status::TransportFailure => TRANSPORT_FAILURE_CODE,
            Status::Http(code) => code as i32,
        }
    }

    /// Anything that is not a valid `u16` status maps back to a transport failure.
    pub fn from_code(code: i32) -> Self {
        match u16::try_from(code) {
            Ok(code) => Status::Http(code),
            Err(_) => Status::TransportFailure,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Status::Http(code) if (200..300).contains(&code))
    }

    /// A response was received but it was not 2xx.
    pub fn is_error(self) -> bool {
        matches!(self, Status::Http(_)) && !self.is_success()
    }

    pub fn is_transport_failure(self) -> bool {
        self == Status::TransportFailure
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status::from_code(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub target: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub status: Status,
    #[serde(with = "crate::serde_utils::duration_nanos")]
    pub duration: Duration,
}

impl ResultRecord {
    /// Builds a record from a send timestamp and a monotonic elapsed time.
    /// `received_at` is derived so both timestamps always agree with `duration`.
    pub fn new(
        target: impl Into<String>,
        sent_at: DateTime<Utc>,
        duration: Duration,
        status: Status,
    ) -> Self {
        let received_at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|elapsed| sent_at.checked_add_signed(elapsed))
            .unwrap_or(sent_at);
        Self {
            target: target.into(),
            sent_at,
            received_at,
            status,
            duration,
        }
    }
}
