use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use stress_core::{
    CancellationToken, Error, Executor, MemorySink, ResultRecord, ResultSink, RunConfig, Status,
    StatusFilter, Url, WaveProgress, dispatch,
};

/// Slow executor that tracks how many executions overlap.
#[derive(Default)]
struct CountingExecutor {
    delay: Duration,
    in_flight: AtomicU64,
    peak: AtomicU64,
    calls: AtomicU64,
}

impl CountingExecutor {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Executor for CountingExecutor {
    async fn execute(&self, target: &Url) -> stress_core::Result<ResultRecord> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let sent_at = Utc::now();
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let status = if call % 3 == 0 { Status::Http(500) } else { Status::OK };
        Ok(ResultRecord::new(target.as_str(), sent_at, self.delay, status))
    }
}

/// Fails to store every other record.
#[derive(Default)]
struct FlakySink {
    inner: MemorySink,
    appends: AtomicU64,
}

#[async_trait]
impl ResultSink for FlakySink {
    async fn append(&self, record: ResultRecord) -> stress_core::Result<()> {
        if self.appends.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(Error::Storage("disk full".to_owned()));
        }
        self.inner.append(record).await
    }

    async fn query_all(&self) -> stress_core::Result<Vec<ResultRecord>> {
        self.inner.query_all().await
    }

    async fn query_by_status(
        &self,
        filter: StatusFilter,
    ) -> stress_core::Result<Vec<ResultRecord>> {
        self.inner.query_by_status(filter).await
    }

    async fn clear(&self) -> stress_core::Result<()> {
        self.inner.clear().await
    }
}

struct BrokenExecutor;

#[async_trait]
impl Executor for BrokenExecutor {
    async fn execute(&self, _target: &Url) -> stress_core::Result<ResultRecord> {
        Err(Error::InvalidConfig(vec!["request could not be built".to_owned()]))
    }
}

/// Panics on every other call.
#[derive(Default)]
struct PanickyExecutor {
    calls: AtomicU64,
}

#[async_trait]
impl Executor for PanickyExecutor {
    async fn execute(&self, target: &Url) -> stress_core::Result<ResultRecord> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            panic!("executor blew up");
        }
        Ok(ResultRecord::new(target.as_str(), Utc::now(), Duration::ZERO, Status::OK))
    }
}

fn config(total: u64, concurrency: u64) -> RunConfig {
    RunConfig::new("http://127.0.0.1:9/", total, concurrency).unwrap()
}

#[tokio::test]
async fn dispatches_every_request_in_waves() {
    let executor = Arc::new(CountingExecutor::with_delay(Duration::from_millis(5)));
    let sink = Arc::new(MemorySink::new());
    let mut waves = Vec::new();

    let summary = dispatch(
        &config(105, 10),
        executor.clone(),
        sink.clone(),
        CancellationToken::new(),
        Some(|p: WaveProgress| waves.push(p)),
    )
    .await
    .unwrap();

    assert_eq!(summary.waves, 11);
    assert_eq!(summary.dispatched, 105);
    assert_eq!(summary.delivered, 105);
    assert_eq!(summary.dropped, 0);
    assert!(!summary.cancelled);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 105);
    assert_eq!(sink.query_all().await.unwrap().len(), 105);

    assert_eq!(waves.len(), 11);
    assert_eq!(waves[9].dispatched, 100);
    assert_eq!(waves[10].dispatched, 105);
    assert!(waves.iter().all(|p| p.total_waves == 11 && p.total_requests == 105));
}

#[tokio::test]
async fn never_exceeds_concurrency_limit() {
    for (total, concurrency) in [(50, 7), (20, 20), (9, 1), (3, 8)] {
        let executor = Arc::new(CountingExecutor::with_delay(Duration::from_millis(20)));
        let sink = Arc::new(MemorySink::new());

        dispatch(
            &config(total, concurrency),
            executor.clone(),
            sink.clone(),
            CancellationToken::new(),
            None::<fn(WaveProgress)>,
        )
        .await
        .unwrap();

        let peak = executor.peak.load(Ordering::SeqCst);
        assert!(peak <= concurrency, "peak {peak} above limit {concurrency}");
        assert_eq!(peak, concurrency.min(total));
        assert_eq!(sink.query_all().await.unwrap().len() as u64, total);
    }
}

#[tokio::test]
async fn record_count_matches_total_for_many_shapes() {
    for total in [1u64, 2, 11, 37] {
        for concurrency in [1u64, 3, 10, 64] {
            let executor = Arc::new(CountingExecutor::default());
            let sink = Arc::new(MemorySink::new());
            let summary = dispatch(
                &config(total, concurrency),
                executor.clone(),
                sink.clone(),
                CancellationToken::new(),
                None::<fn(WaveProgress)>,
            )
            .await
            .unwrap();
            assert_eq!(summary.dispatched, total);
            assert_eq!(executor.calls.load(Ordering::SeqCst), total);
            assert_eq!(sink.query_all().await.unwrap().len() as u64, total);
        }
    }
}

#[tokio::test]
async fn cancellation_between_waves_stops_dispatching() {
    let executor = Arc::new(CountingExecutor::with_delay(Duration::from_millis(2)));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let summary = dispatch(
        &config(105, 10),
        executor.clone(),
        sink.clone(),
        cancel,
        Some(move |p: WaveProgress| {
            if p.wave == 3 {
                trigger.cancel();
            }
        }),
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.waves, 3);
    assert_eq!(summary.dispatched, 30);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 30);
    assert_eq!(sink.query_all().await.unwrap().len(), 30);
}

#[tokio::test]
async fn cancellation_mid_wave_keeps_in_flight_results() {
    let executor = Arc::new(CountingExecutor::with_delay(Duration::from_millis(200)));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let summary = dispatch(
        &config(100, 10),
        executor.clone(),
        sink.clone(),
        cancel,
        None::<fn(WaveProgress)>,
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.dispatched, 10);
    assert_eq!(summary.delivered, 10);
    assert_eq!(sink.query_all().await.unwrap().len(), 10);
}

#[tokio::test]
async fn cancelled_before_start_dispatches_nothing() {
    let executor = Arc::new(CountingExecutor::default());
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = dispatch(
        &config(10, 5),
        executor.clone(),
        sink.clone(),
        cancel,
        None::<fn(WaveProgress)>,
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.waves, 0);
    assert_eq!(summary.dispatched, 0);
    assert!(sink.query_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn sink_failures_drop_records_without_aborting() {
    let executor = Arc::new(CountingExecutor::default());
    let sink = Arc::new(FlakySink::default());

    let summary = dispatch(
        &config(20, 4),
        executor,
        sink.clone(),
        CancellationToken::new(),
        None::<fn(WaveProgress)>,
    )
    .await
    .unwrap();

    assert_eq!(summary.dispatched, 20);
    assert_eq!(summary.delivered, 10);
    assert_eq!(summary.dropped, 10);
    assert_eq!(sink.query_all().await.unwrap().len(), 10);
}

#[tokio::test]
async fn fatal_executor_error_aborts_run() {
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let result = dispatch(
        &config(30, 5),
        Arc::new(BrokenExecutor),
        sink.clone(),
        cancel.clone(),
        None::<fn(WaveProgress)>,
    )
    .await;

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(cancel.is_cancelled());
    assert!(sink.query_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn panicking_requests_are_dropped_not_fatal() {
    let sink = Arc::new(MemorySink::new());

    let summary = dispatch(
        &config(8, 4),
        Arc::new(PanickyExecutor::default()),
        sink.clone(),
        CancellationToken::new(),
        None::<fn(WaveProgress)>,
    )
    .await
    .unwrap();

    assert_eq!(summary.dispatched, 8);
    assert_eq!(summary.delivered, 4);
    assert_eq!(summary.dropped, 4);
    assert!(!summary.cancelled);
    assert_eq!(sink.query_all().await.unwrap().len(), 4);
}
