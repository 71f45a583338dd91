//! Waiting for the registry to accept requests before a run starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Errors waiting for readiness.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The service did not respond with a status below `500` in time.
    #[error("service at {url} not ready after {timeout:?}")]
    Timeout {
        /// The probed URL.
        url: String,
        /// The overall time waited.
        timeout: Duration,
    },
}

/// Parameters of the readiness probe.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Readiness {
    /// Whether to wait for readiness at all.
    pub enabled: bool,

    /// URL to probe. Defaults to the benchmark target.
    pub url: Option<String>,

    /// Overall time to wait until giving up.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between two probes.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout of a single probe request.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            timeout: Duration::from_secs(180),
            interval: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Polls `url` until it responds with a status below `500`.
///
/// Connection errors, probe timeouts and server errors are retried every `interval` until the overall
/// `timeout` has elapsed.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    url: &str,
    readiness: &Readiness,
) -> Result<(), ReadinessError> {
    tracing::info!(url, "waiting for service");
    let deadline = Instant::now() + readiness.timeout;

    loop {
        let probe = client
            .get(url)
            .timeout(readiness.probe_timeout)
            .send()
            .await;

        match probe {
            Ok(response) if !response.status().is_server_error() => {
                tracing::info!(status = %response.status(), "service responding");
                return Ok(());
            }
            Ok(response) => tracing::debug!(status = %response.status(), "service not ready"),
            Err(error) => tracing::debug!(
                error = &error as &dyn std::error::Error,
                "service not reachable"
            ),
        }

        if Instant::now() + readiness.interval > deadline {
            return Err(ReadinessError::Timeout {
                url: url.to_owned(),
                timeout: readiness.timeout,
            });
        }
        tokio::time::sleep(readiness.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use regbench_test::server::TestServer;

    use super::*;

    fn quick() -> Readiness {
        Readiness {
            timeout: Duration::from_millis(300),
            interval: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ready_when_responding() {
        regbench_test::tracing::init();
        let server = TestServer::new().await;
        let client = reqwest::Client::new();

        wait_until_ready(&client, &server.url("/health"), &quick())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn client_errors_count_as_ready() {
        let server = TestServer::new().await;
        let client = reqwest::Client::new();

        // 404, but the service is up
        wait_until_ready(&client, &server.url("/does-not-exist"), &quick())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn times_out_without_service() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{port}/health");

        let start = std::time::Instant::now();
        let result = wait_until_ready(&client, &url, &quick()).await;

        assert!(matches!(result, Err(ReadinessError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
