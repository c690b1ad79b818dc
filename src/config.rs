use std::fs;
use std::path::Path;

use stress_core::ClientConfig;

use crate::cli::Cli;
use crate::prelude::*;

/// Client settings: defaults, then the YAML file if any, then CLI flags.
pub fn load_client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.client_config {
        Some(path) => from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(secs) = cli.connect_timeout {
        config.connect_timeout_secs = secs;
    }
    if let Some(secs) = cli.request_timeout {
        config.request_timeout_secs = Some(secs);
    }
    if let Some(max) = cli.max_idle_per_host {
        config.max_idle_per_host = max;
    }
    Ok(config)
}

pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let content = fs::read_to_string(path.as_ref())?;
    let config: ClientConfig = serde_yaml::from_str(&content)?;
    debug!("Loaded client config from {}", path.as_ref().display());
    Ok(config)
}
