//! Process-wide initialization barrier
//!
//! Runs once before the worker accepts any job: wait until the archiving proxy
//! answers its health endpoint, then make sure the dedup date index exists.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::dedup::{DedupError, DedupStore};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Proxy at {url} still unhealthy after {attempts} attempts")]
    ProxyUnavailable { url: String, attempts: u32 },

    #[error("Failed to build health-check client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Dedup(#[from] DedupError),
}

/// Poll `status_url` until it answers with a success status
///
/// Returns the number of the probe that succeeded. Gives up after
/// `max_attempts` probes spaced `backoff` apart.
pub async fn wait_for_proxy(
    status_url: &str,
    backoff: Duration,
    max_attempts: u32,
) -> Result<u32, InitError> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(backoff.max(Duration::from_secs(1)))
        .build()?;

    for attempt in 1..=max_attempts {
        match client.get(status_url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(attempt, url = status_url, "proxy is healthy");
                return Ok(attempt);
            }
            Ok(response) => {
                warn!(attempt, status = response.status().as_u16(), "proxy not healthy yet");
            }
            Err(e) => warn!(attempt, "proxy not reachable yet: {e}"),
        }
        if attempt < max_attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    Err(InitError::ProxyUnavailable {
        url: status_url.to_string(),
        attempts: max_attempts,
    })
}

/// Run the initialization barrier
pub async fn initialize<D: DedupStore>(config: &WorkerConfig, store: &D) -> Result<(), InitError> {
    let status_url = format!("{}/status", config.proxy_url());
    wait_for_proxy(
        &status_url,
        config.health_check_backoff(),
        config.health_check_max_attempts(),
    )
    .await?;
    store.ensure_date_index().await?;
    info!("worker initialized");
    Ok(())
}
