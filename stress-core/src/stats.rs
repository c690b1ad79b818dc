use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::*;
use crate::record::{ResultRecord, Status};
use crate::serde_utils::{duration_nanos, option_duration_nanos};

/// Ranks reported by [`percentiles`].
pub const PERCENTILE_RANKS: [u32; 6] = [10, 25, 50, 75, 90, 99];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucketing {
    /// One bucket, key `0`, for the whole run.
    #[default]
    WholeRun,
    /// Whole seconds elapsed since the earliest `sent_at` of the run.
    PerSecond,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntervalSummary {
    pub count: u64,
    pub error_count: u64,
    pub transport_failure_count: u64,
    #[serde(with = "duration_nanos")]
    pub total_duration: Duration,
    #[serde(serialize_with = "option_duration_nanos::serialize")]
    pub min_duration: Option<Duration>,
    #[serde(serialize_with = "option_duration_nanos::serialize")]
    pub max_duration: Option<Duration>,
}

impl IntervalSummary {
    fn record(&mut self, record: &ResultRecord) {
        self.count += 1;
        if record.status.is_transport_failure() {
            self.transport_failure_count += 1;
        } else if record.status.is_error() {
            self.error_count += 1;
        }
        self.total_duration += record.duration;
        let duration = record.duration;
        self.min_duration = Some(self.min_duration.map_or(duration, |d| d.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |d| d.max(duration)));
    }

    pub fn success_count(&self) -> u64 {
        self.count - self.error_count - self.transport_failure_count
    }

    pub fn average_duration(&self) -> Option<Duration> {
        u32::try_from(self.count)
            .ok()
            .filter(|&count| count > 0)
            .map(|count| self.total_duration / count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCodeSummary {
    pub status: Status,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PercentileSummary {
    #[serde(with = "duration_nanos")]
    pub p10: Duration,
    #[serde(with = "duration_nanos")]
    pub p25: Duration,
    #[serde(with = "duration_nanos")]
    pub p50: Duration,
    #[serde(with = "duration_nanos")]
    pub p75: Duration,
    #[serde(with = "duration_nanos")]
    pub p90: Duration,
    #[serde(with = "duration_nanos")]
    pub p99: Duration,
}

impl PercentileSummary {
    pub fn iter(&self) -> impl Iterator<Item = (u32, Duration)> {
        PERCENTILE_RANKS
            .into_iter()
            .zip([self.p10, self.p25, self.p50, self.p75, self.p90, self.p99])
    }
}

fn bucket_key(bucketing: Bucketing, origin: DateTime<Utc>, sent_at: DateTime<Utc>) -> u64 {
    match bucketing {
        Bucketing::WholeRun => 0,
        Bucketing::PerSecond => (sent_at - origin).num_seconds().max(0) as u64,
    }
}

/// Groups records into time buckets. Empty input gives an empty map.
pub fn interval_summaries(
    records: &[ResultRecord],
    bucketing: Bucketing,
) -> BTreeMap<u64, IntervalSummary> {
    let mut buckets: BTreeMap<u64, IntervalSummary> = BTreeMap::new();
    let Some(origin) = records.iter().map(|r| r.sent_at).min() else {
        return buckets;
    };
    for record in records {
        buckets
            .entry(bucket_key(bucketing, origin, record.sent_at))
            .or_default()
            .record(record);
    }
    buckets
}

/// Occurrences per status, transport failures included as their own entry.
pub fn status_distribution(records: &[ResultRecord]) -> BTreeMap<Status, StatusCodeSummary> {
    let mut statuses = BTreeMap::new();
    for record in records {
        statuses
            .entry(record.status)
            .or_insert(StatusCodeSummary {
                status: record.status,
                count: 0,
            })
            .count += 1;
    }
    statuses
}

/// Index of rank `p` in a sorted sequence of `len` elements (nearest rank),
/// clamped so that high ranks on short inputs stay in bounds.
fn rank_index(len: usize, p: u32) -> usize {
    (len * p as usize / 100).min(len - 1)
}

/// Nearest-rank percentiles over record durations.
pub fn percentiles(records: &[ResultRecord]) -> Result<PercentileSummary> {
    if records.is_empty() {
        return Err(Error::InsufficientData);
    }
    let mut durations: Vec<Duration> = records.iter().map(|r| r.duration).collect();
    durations.sort_unstable();

    let at = |p: u32| durations[rank_index(durations.len(), p)];
    Ok(PercentileSummary {
        p10: at(10),
        p25: at(25),
        p50: at(50),
        p75: at(75),
        p90: at(90),
        p99: at(99),
    })
}

/// Everything the reporter renders for one run.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total: u64,
    #[serde(with = "duration_nanos")]
    pub elapsed: Duration,
    pub requests_per_sec: f64,
    pub intervals: BTreeMap<u64, IntervalSummary>,
    pub statuses: Vec<StatusCodeSummary>,
    pub percentiles: Option<PercentileSummary>,
}

impl StatsReport {
    pub fn from_records(records: &[ResultRecord], bucketing: Bucketing, elapsed: Duration) -> Self {
        let total = records.len() as u64;
        let requests_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        };
        Self {
            total,
            elapsed,
            requests_per_sec,
            intervals: interval_summaries(records, bucketing),
            statuses: status_distribution(records).into_values().collect(),
            percentiles: percentiles(records).ok(),
        }
    }
}
