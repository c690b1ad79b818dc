mod client;
mod dispatcher;
mod error;
mod executor;
mod record;
mod serde_utils;
mod sink;
mod stats;

pub use client::{ClientConfig, build_client};
pub use dispatcher::{DispatchSummary, WavePlan, WaveProgress, dispatch};
pub use error::*;
pub use executor::{Executor, HttpExecutor};
pub use record::{ResultRecord, Status, TRANSPORT_FAILURE_CODE};
pub use reqwest::Url;
pub use sink::{MemorySink, ResultSink, StatusFilter};
pub use stats::{
    Bucketing, IntervalSummary, PERCENTILE_RANKS, PercentileSummary, StatsReport, StatusCodeSummary,
    interval_summaries, percentiles, status_distribution,
};
pub use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub target: Url,
    pub total_requests: u64,
    pub concurrency: u64,
}

impl RunConfig {
    /// Validates raw run parameters. Every problem found is reported at once.
    pub fn new(target: &str, total_requests: u64, concurrency: u64) -> Result<Self> {
        let mut problems = Vec::new();
        if total_requests == 0 {
            problems.push("requests must be greater than 0".to_owned());
        }
        if concurrency == 0 {
            problems.push("concurrency must be greater than 0".to_owned());
        }
        let target = match parse_target(target) {
            Ok(url) => Some(url),
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        };
        match target {
            Some(target) if problems.is_empty() => Ok(Self {
                target,
                total_requests,
                concurrency,
            }),
            _ => Err(Error::InvalidConfig(problems)),
        }
    }
}

pub fn parse_target(raw: &str) -> Result<Url> {
    let invalid = |reason: &str| Error::InvalidTarget {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };
    if raw.trim().is_empty() {
        return Err(invalid("url must not be empty"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(&format!("unsupported scheme '{}'", other))),
    }
}

/// Builds the shared client and runs the whole request volume against the
/// sink, which is cleared first.
pub async fn run<F>(
    config: &RunConfig,
    client_config: &ClientConfig,
    sink: std::sync::Arc<dyn ResultSink>,
    cancel: CancellationToken,
    on_progress: Option<F>,
) -> Result<DispatchSummary>
where
    F: FnMut(WaveProgress) + Send,
{
    let client = build_client(client_config)?;
    let executor = std::sync::Arc::new(HttpExecutor::new(client));
    sink.clear().await?;
    dispatch(config, executor, sink, cancel, on_progress).await
}
