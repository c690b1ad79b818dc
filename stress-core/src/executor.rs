use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, Url};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::*;
use crate::record::{ResultRecord, Status};

/// Performs one timed request against the target.
///
/// Transport failures are part of the returned record. `Err` is reserved for
/// requests that cannot even be constructed, which is a configuration problem
/// and ends the run.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, target: &Url) -> Result<ResultRecord>;
}

#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, target: &Url) -> Result<ResultRecord> {
        let request = self
            .client
            .get(target.clone())
            .build()
            .map_err(Error::Request)?;

        let sent_at = Utc::now();
        let start = Instant::now();
        let status = match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status().as_u16();
                drain_body(response).await;
                Status::Http(status)
            }
            Err(e) => {
                debug!("Transport failure for {}: {}", target, e);
                Status::TransportFailure
            }
        };

        Ok(ResultRecord::new(target.as_str(), sent_at, start.elapsed(), status))
    }
}

/// Reads the body to the end without keeping it so the connection can go back
/// to the pool.
async fn drain_body(mut response: Response) {
    let mut read = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len() as u64,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to drain response body after {} bytes: {}", read, e);
                return;
            }
        }
    }
    debug!("Drained {} body bytes", read);
}
