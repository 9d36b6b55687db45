use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, error, warn};

use super::{EndpointProber, ProbeResult};
use crate::registry::EndpointSpec;

/// HTTP-based endpoint prober with connection pooling and redirect
/// following. One request per probe, no retries; the scheduler decides when
/// to try again.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Self::build_client(timeout),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_max_idle_per_host(20)
            .gzip(true)
            .build()
            .expect("Failed to build HTTP client")
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn probe(&self, spec: &EndpointSpec) -> ProbeResult {
        let method = Method::from_bytes(spec.method.as_bytes()).unwrap_or(Method::GET);
        let started = Instant::now();

        match self.client.request(method, &spec.url).send().await {
            Ok(response) => {
                let elapsed = started.elapsed();
                let code = response.status().as_u16();
                if code == spec.expected_status {
                    debug!(url = %spec.url, code, elapsed_ms = elapsed.as_millis() as u64, "Endpoint up");
                    ProbeResult::up(spec, code, elapsed)
                } else {
                    warn!(url = %spec.url, code, expected = spec.expected_status, "Endpoint returned unexpected status");
                    ProbeResult::down(spec, Some(code), format!("HTTP {}", code))
                }
            }
            Err(e) if e.is_timeout() => {
                warn!(url = %spec.url, "Endpoint probe timed out");
                ProbeResult::down(spec, None, "Timeout")
            }
            Err(e) if e.is_connect() => {
                warn!(url = %spec.url, "Endpoint connection failed");
                ProbeResult::down(spec, None, "Connection Error")
            }
            Err(e) => {
                error!(url = %spec.url, error = %e, "Endpoint probe failed");
                ProbeResult::down(spec, None, e.to_string())
            }
        }
    }
}
