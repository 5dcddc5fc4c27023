
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Blocking JSON client with retries shared by the embedding providers
#[derive(Debug, Clone)]
pub(crate) struct JsonClient {
    base_url: Url,
    agent: ureq::Agent,
    pub(crate) retry_attempts: u32,
    initial_backoff: Duration,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl JsonClient {
    pub(crate) fn new(base_url: Url, timeout: Duration, retry_attempts: u32) -> Self {
        Self {
            base_url,
            agent: build_agent(timeout),
            retry_attempts: retry_attempts.max(1),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.agent = build_agent(timeout);
    }

    pub(crate) fn set_retry_attempts(&mut self, attempts: u32) {
        self.retry_attempts = attempts.max(1);
    }

    pub(crate) fn set_initial_backoff(&mut self, backoff: Duration) {
        self.initial_backoff = backoff;
    }

    /// POST `body` as JSON to `path` and decode the JSON response
    pub(crate) fn post_json<B, R>(&self, path: &str, body: &B, bearer: Option<&str>) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        let response_text = self.request_with_retry(|| {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            let error = match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => error,
            };

            match classify(&error) {
                Retry::Transient => {
                    warn!(
                        "Request failed ({}), attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(error);
                }
                Retry::Never => {
                    warn!("Request failed ({}), not retrying", error);
                    return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                }
            }

            if attempt < self.retry_attempts {
                let delay = backoff_delay(self.initial_backoff, attempt);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!(
            "Giving up on {} after {} attempts",
            self.base_url, self.retry_attempts
        );
        Err(last_error.map_or_else(
            || anyhow::anyhow!("Request failed after retries"),
            |e| anyhow::anyhow!("Request error: {}", e),
        ))
    }
}

/// Whether a failed request is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    Transient,
    Never,
}

/// Server errors, rate limits and transport failures are transient
fn classify(error: &ureq::Error) -> Retry {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 || *status == 429 => Retry::Transient,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Retry::Transient,
        _ => Retry::Never,
    }
}

/// Pause before the retry that follows `attempt` (1-based)
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
}
