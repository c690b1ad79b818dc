use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::*;
use crate::record::{ResultRecord, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Equals(Status),
    NotEquals(Status),
}

impl StatusFilter {
    /// Records answered with 200.
    pub fn ok() -> Self {
        StatusFilter::Equals(Status::OK)
    }

    /// Everything else, transport failures included.
    pub fn not_ok() -> Self {
        StatusFilter::NotEquals(Status::OK)
    }

    pub fn matches(&self, status: Status) -> bool {
        match *self {
            StatusFilter::Equals(expected) => status == expected,
            StatusFilter::NotEquals(expected) => status != expected,
        }
    }
}

/// Where the dispatcher delivers records.
///
/// `append` is called concurrently by every in-flight request. Queries are
/// only issued once the run is over.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn append(&self, record: ResultRecord) -> Result<()>;

    async fn query_all(&self) -> Result<Vec<ResultRecord>>;

    async fn query_by_status(&self, filter: StatusFilter) -> Result<Vec<ResultRecord>>;

    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ResultRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Storage("memory sink lock poisoned".to_owned()))
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, record: ResultRecord) -> Result<()> {
        self.lock()?.push(record);
        Ok(())
    }

    async fn query_all(&self) -> Result<Vec<ResultRecord>> {
        Ok(self.lock()?.clone())
    }

    async fn query_by_status(&self, filter: StatusFilter) -> Result<Vec<ResultRecord>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| filter.matches(r.status))
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
