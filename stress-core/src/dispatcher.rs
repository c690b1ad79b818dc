use std::sync::Arc;

use reqwest::Url;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::RunConfig;
use crate::error::*;
use crate::executor::Executor;
use crate::sink::ResultSink;

/// How a run is split into waves of at most `concurrency` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavePlan {
    pub wave_size: u64,
    pub full_waves: u64,
    pub remainder: u64,
}

impl WavePlan {
    pub fn new(total_requests: u64, concurrency: u64) -> Self {
        let wave_size = concurrency.max(1);
        let full_waves = total_requests / wave_size;
        let remainder = total_requests - full_waves * wave_size;
        Self {
            wave_size,
            full_waves,
            remainder,
        }
    }

    pub fn total_waves(&self) -> u64 {
        self.full_waves + u64::from(self.remainder > 0)
    }

    /// Wave sizes in dispatch order.
    pub fn waves(&self) -> impl Iterator<Item = u64> + use<> {
        let wave_size = self.wave_size;
        let remainder = self.remainder;
        std::iter::repeat_n(wave_size, self.full_waves as usize)
            .chain((remainder > 0).then_some(remainder))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveProgress {
    /// 1-based index of the wave that just finished.
    pub wave: u64,
    pub total_waves: u64,
    pub dispatched: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub waves: u64,
    pub dispatched: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct WaveOutcome {
    started: u64,
    delivered: u64,
    dropped: u64,
    fatal: Option<Error>,
}

/// Drives `config.total_requests` executions against `config.target`, wave by
/// wave, and appends every record to `sink`.
///
/// A wave only starts after every request of the previous one has finished
/// and been delivered, so no more than `config.concurrency` requests are ever
/// in flight. `cancel` is checked before each wave and each request; requests
/// already running are allowed to finish and their records are kept.
pub async fn dispatch<F>(
    config: &RunConfig,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
    mut on_progress: Option<F>,
) -> Result<DispatchSummary>
where
    F: FnMut(WaveProgress) + Send,
{
    let plan = WavePlan::new(config.total_requests, config.concurrency);
    let total_waves = plan.total_waves();
    let target = Arc::new(config.target.clone());
    let start = Instant::now();

    let mut summary = DispatchSummary {
        waves: 0,
        dispatched: 0,
        delivered: 0,
        dropped: 0,
        cancelled: false,
        elapsed: Duration::ZERO,
    };

    for (index, size) in plan.waves().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let wave = index as u64 + 1;
        debug!("Wave {}/{}: {} requests to {}", wave, total_waves, size, target);

        let outcome = run_wave(size, &target, &executor, &sink, &cancel).await;
        summary.waves += 1;
        summary.dispatched += outcome.started;
        summary.delivered += outcome.delivered;
        summary.dropped += outcome.dropped;

        if let Some(e) = outcome.fatal {
            error!("Aborting run after wave {}: {}", wave, e);
            return Err(e);
        }

        if let Some(ref mut cb) = on_progress {
            cb(WaveProgress {
                wave,
                total_waves,
                dispatched: summary.dispatched,
                total_requests: config.total_requests,
            });
        }
    }

    summary.cancelled = summary.dispatched < config.total_requests;
    summary.elapsed = start.elapsed();
    if summary.cancelled {
        info!(
            "Run cancelled after {} of {} requests",
            summary.dispatched, config.total_requests
        );
    }
    Ok(summary)
}

async fn run_wave(
    size: u64,
    target: &Arc<Url>,
    executor: &Arc<dyn Executor>,
    sink: &Arc<dyn ResultSink>,
    cancel: &CancellationToken,
) -> WaveOutcome {
    let mut outcome = WaveOutcome::default();
    let mut set = JoinSet::new();

    for _ in 0..size {
        if cancel.is_cancelled() {
            break;
        }
        let target = target.clone();
        let executor = executor.clone();
        let sink = sink.clone();
        set.spawn(async move {
            let record = executor.execute(&target).await?;
            Ok::<bool, Error>(deliver(sink.as_ref(), record).await)
        });
        outcome.started += 1;
    }

    // Barrier: the wave is over only when every request has been delivered.
    while let Some(res) = set.join_next().await {
        match res {
            Ok(Ok(true)) => outcome.delivered += 1,
            Ok(Ok(false)) => outcome.dropped += 1,
            Ok(Err(e)) => {
                cancel.cancel();
                outcome.fatal.get_or_insert(e);
            }
            Err(e) => {
                warn!("Request task failed: {}", e);
                outcome.dropped += 1;
            }
        }
    }
    outcome
}

async fn deliver(sink: &dyn ResultSink, record: crate::record::ResultRecord) -> bool {
    match sink.append(record).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to store result, dropping it: {}", e);
            false
        }
    }
}
