use std::time::Duration;

use console::style;
use hdrhistogram::Histogram;
use serde::Serialize;
use stress_core::{DispatchSummary, ResultRecord, StatsReport};

use crate::prelude::*;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub target: &'a str,
    pub requested: u64,
    pub concurrency: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub cancelled: bool,
    pub latency: Option<LatencyStats>,
    #[serde(flatten)]
    pub stats: &'a StatsReport,
}

/// Latency spread in microseconds, from an HDR histogram of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub mean: f64,
    pub stdev: f64,
    pub max: u64,
    pub within_stdev_pct: f64,
}

impl LatencyStats {
    pub fn from_records(records: &[ResultRecord]) -> Option<Self> {
        let mut hist = Histogram::<u64>::new(3).ok()?;
        for record in records {
            if let Err(e) = hist.record(record.duration.as_micros() as u64) {
                warn!("Skipping latency sample: {}", e);
            }
        }
        if hist.is_empty() {
            return None;
        }

        let mean = hist.mean();
        let stdev = hist.stdev();
        let low = (mean - stdev).max(0.0) as u64;
        let high = (mean + stdev) as u64;
        let within: u64 = hist
            .iter_recorded()
            .filter(|v| (low..=high).contains(&v.value_iterated_to()))
            .map(|v| v.count_at_value())
            .sum();

        Some(Self {
            mean,
            stdev,
            max: hist.max(),
            within_stdev_pct: within as f64 / hist.len() as f64 * 100.0,
        })
    }
}

pub fn fmt_duration(d: Duration) -> String {
    let micros = d.as_secs_f64() * 1_000_000.0;
    fmt_micros(micros)
}

fn fmt_micros(micros: f64) -> String {
    if micros >= 1_000_000.0 {
        format!("{:.2}s", micros / 1_000_000.0)
    } else if micros >= 1_000.0 {
        format!("{:.2}ms", micros / 1_000.0)
    } else {
        format!("{:.2}us", micros)
    }
}

fn fmt_optional(d: Option<Duration>) -> String {
    d.map(fmt_duration).unwrap_or_else(|| "-".to_owned())
}

pub fn render_text(
    target: &str,
    summary: &DispatchSummary,
    stats: &StatsReport,
    latency: Option<&LatencyStats>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Finished {} requests to {} in {} ({:.2} req/s)\n",
        summary.dispatched,
        target,
        fmt_duration(summary.elapsed),
        stats.requests_per_sec
    ));
    if summary.cancelled {
        let notice = style("Run was cancelled before all requests were sent").yellow();
        out.push_str(&format!("{}\n", notice));
    }
    if summary.dropped > 0 {
        let notice = format!("{} results could not be stored and are not counted", summary.dropped);
        out.push_str(&format!("{}\n", style(notice).red()));
    }

    out.push_str(&format!(
        "\n{:>8}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\n",
        "Second", "Rate", "Error", "Avg Time", "Min Time", "Max Time", "Net Error"
    ));
    for (bucket, interval) in &stats.intervals {
        out.push_str(&format!(
            "{:>8}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\t{:>10}\n",
            bucket,
            interval.count,
            interval.error_count,
            fmt_optional(interval.average_duration()),
            fmt_optional(interval.min_duration),
            fmt_optional(interval.max_duration),
            interval.transport_failure_count
        ));
    }

    out.push_str(&format!("\n{:<7}\t{:>11}\n", "Status", "# Responses"));
    for status in &stats.statuses {
        out.push_str(&format!("{:<7}\t{:>11}\n", status.status.code(), status.count));
    }

    out.push_str(&format!("\n{:<10}\t{:>10}\n", "Percentile", "Duration"));
    match &stats.percentiles {
        Some(percentiles) => {
            for (rank, value) in percentiles.iter() {
                let label = format!("P{}", rank);
                out.push_str(&format!("{:<10}\t{:>10}\n", label, fmt_duration(value)));
            }
        }
        None => out.push_str("no data\n"),
    }

    if let Some(latency) = latency {
        out.push_str(&format!(
            "\n  Latency   avg {:>8}  stdev {:>8}  max {:>8}  +/- stdev {:.2}%\n",
            fmt_micros(latency.mean),
            fmt_micros(latency.stdev),
            fmt_micros(latency.max as f64),
            latency.within_stdev_pct
        ));
    }

    out
}

pub fn render_json(report: &JsonReport<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
