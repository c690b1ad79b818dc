use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use stress_core::Bucketing;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// Keep results in process memory
    Memory,
    /// Keep results in SQLite (in-memory unless --db-path is given)
    Sqlite,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketMode {
    /// One summary row for the whole run
    Whole,
    /// One summary row per second of the run
    Second,
}

impl From<BucketMode> for Bucketing {
    fn from(mode: BucketMode) -> Self {
        match mode {
            BucketMode::Whole => Bucketing::WholeRun,
            BucketMode::Second => Bucketing::PerSecond,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stress")]
#[command(author, version, about = "HTTP GET stress tester", long_about = None)]
pub struct Cli {
    /// Url to be tested
    #[arg(short, long, env = "STRESS_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Total number of requests
    #[arg(short, long, env = "STRESS_REQUESTS", default_value_t = 105)]
    pub requests: u64,

    /// Number of requests in flight at the same time
    #[arg(short, long, env = "STRESS_CONCURRENCY", default_value_t = 10)]
    pub concurrency: u64,

    /// How to group requests in the summary table
    #[arg(long, value_enum, default_value_t = BucketMode::Whole)]
    pub buckets: BucketMode,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Where results are stored during the run
    #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// SQLite file for --store sqlite
    #[arg(long, env = "STRESS_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// YAML file with HTTP client settings
    #[arg(long, env = "STRESS_CLIENT_CONFIG")]
    pub client_config: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Overall per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Maximum idle pooled connections to the target
    #[arg(long)]
    pub max_idle_per_host: Option<usize>,

    /// Do not check that the target answers 200 before the run
    #[arg(long, default_value_t = false)]
    pub skip_preflight: bool,
}
