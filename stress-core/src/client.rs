use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::*;

/// Connection tuning for the shared HTTP client.
///
/// reqwest has no dedicated TLS handshake timeout, so the larger of
/// `connect_timeout_secs` and `tls_handshake_timeout_secs` bounds the whole
/// connection setup, TLS included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connect_timeout_secs: u64,
    pub keep_alive_secs: u64,
    pub max_idle_per_host: usize,
    pub idle_timeout_secs: u64,
    pub tls_handshake_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keep_alive_secs: 30,
            max_idle_per_host: 200,
            idle_timeout_secs: 90,
            tls_handshake_timeout_secs: 10,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    fn connection_setup_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(self.tls_handshake_timeout_secs))
    }
}

pub fn build_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = Client::builder()
        // Connections are pooled and reused by every request of the run
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .tcp_keepalive(Duration::from_secs(config.keep_alive_secs))
        .connect_timeout(config.connection_setup_timeout())
        .tcp_nodelay(true);

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().map_err(Error::Client)
}
