use std::{env, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{Router, http::StatusCode, routing::get};
use mimalloc::MiMalloc;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const WORK_DELAY: Duration = Duration::from_millis(10);
const SERVER_ERROR_PCT: u32 = 3;
const TOO_MANY_REQUESTS_PCT: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("info"),
        })
        .init();

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

fn app() -> Router {
    Router::new()
        .route("/", get(work))
        .route("/health", get(health_check))
}

/// Simulates a little work and fails a small share of requests.
async fn work() -> (StatusCode, &'static str) {
    tokio::time::sleep(WORK_DELAY).await;
    let roll = rand::thread_rng().gen_range(0..100);
    outcome(roll)
}

fn outcome(roll: u32) -> (StatusCode, &'static str) {
    if roll < SERVER_ERROR_PCT {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    } else if roll < SERVER_ERROR_PCT + TOO_MANY_REQUESTS_PCT {
        (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
    } else {
        (StatusCode::OK, "OK")
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_shares() {
        let codes: Vec<StatusCode> = (0..100).map(|roll| outcome(roll).0).collect();
        let count = |code| codes.iter().filter(|c| **c == code).count();
        assert_eq!(count(StatusCode::INTERNAL_SERVER_ERROR), 3);
        assert_eq!(count(StatusCode::TOO_MANY_REQUESTS), 3);
        assert_eq!(count(StatusCode::OK), 94);
    }

    #[tokio::test]
    async fn serves_health_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app()).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        assert!(body.starts_with("HTTP/1.1 200"), "{body}");
        assert!(body.ends_with("OK"));
    }
}
