mod cli;
mod config;
mod error;
mod http_probe;
mod report;

pub mod prelude {
    pub use crate::error::*;
    pub use tracing::{debug, error, info, warn};
}

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use mimalloc::MiMalloc;
use prelude::*;
use stress_core::{
    CancellationToken, ClientConfig, MemorySink, ResultSink, RunConfig, StatsReport, WaveProgress,
    build_client,
};
use stress_storage::SqliteSink;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, OutputFormat, StoreKind};
use crate::report::{JsonReport, LatencyStats};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}";
const USAGE: &str = "Usage: stress --url=http://localhost:8080 --requests=1000 --concurrency=10";

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("info"),
        })
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        if matches!(e, Error::InvalidParameters(_) | Error::PreflightFailed(_)) {
            eprintln!("{}", USAGE);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client_config = config::load_client_config(&cli)?;
    let run_config = validate(&cli, &client_config).await?;
    info!(
        "{} v{}: {} requests to {} with concurrency {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        run_config.total_requests,
        run_config.target,
        run_config.concurrency
    );

    let sink = open_sink(&cli).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, letting in-flight requests finish");
            on_signal.cancel();
        }
    });

    let pb = if cli.output == OutputFormat::Text {
        let pb = ProgressBar::new(run_config.total_requests);
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };
    let pb_clone = pb.clone();

    let summary = stress_core::run(
        &run_config,
        &client_config,
        sink.clone(),
        cancel,
        Some(move |p: WaveProgress| {
            pb_clone.set_position(p.dispatched);
            pb_clone.set_message(format!("Wave {}/{}", p.wave, p.total_waves));
        }),
    )
    .await?;
    pb.finish_and_clear();

    info!(
        "Finished {} requests for endpoint {} in {:?}",
        summary.dispatched, run_config.target, summary.elapsed
    );
    if summary.dropped > 0 {
        warn!("{} results were dropped by the result store", summary.dropped);
    }

    let records = sink.query_all().await?;
    let stats = StatsReport::from_records(&records, cli.buckets.into(), summary.elapsed);
    let latency = LatencyStats::from_records(&records);

    match cli.output {
        OutputFormat::Text => {
            print!(
                "{}",
                report::render_text(run_config.target.as_str(), &summary, &stats, latency.as_ref())
            );
        }
        OutputFormat::Json => {
            let report = JsonReport {
                target: run_config.target.as_str(),
                requested: run_config.total_requests,
                concurrency: run_config.concurrency,
                dispatched: summary.dispatched,
                dropped: summary.dropped,
                cancelled: summary.cancelled,
                latency,
                stats: &stats,
            };
            println!("{}", report::render_json(&report)?);
        }
    }

    Ok(())
}

/// Checks the run parameters and, unless skipped, that the target answers 200.
/// Every problem found is reported together.
async fn validate(cli: &Cli, client_config: &ClientConfig) -> Result<RunConfig> {
    let run_config =
        RunConfig::new(&cli.url, cli.requests, cli.concurrency).map_err(|e| match e {
            stress_core::Error::InvalidConfig(problems) => Error::InvalidParameters(problems),
            other => Error::InvalidParameters(vec![other.to_string()]),
        })?;

    if !cli.skip_preflight {
        let client = build_client(client_config)?;
        http_probe::preflight(&client, &run_config.target).await?;
    }
    Ok(run_config)
}

async fn open_sink(cli: &Cli) -> Result<Arc<dyn ResultSink>> {
    let sink: Arc<dyn ResultSink> = match (cli.store, &cli.db_path) {
        (StoreKind::Memory, _) => Arc::new(MemorySink::new()),
        (StoreKind::Sqlite, Some(path)) => Arc::new(SqliteSink::open(path).await?),
        (StoreKind::Sqlite, None) => Arc::new(SqliteSink::in_memory().await?),
    };
    Ok(sink)
}
