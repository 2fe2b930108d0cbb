//! HTTP probe implementation.

use std::error::Error as _;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::DATE;

use super::{ApplicationTarget, CheckOutcome, ProbeError};

/// Runs single-attempt HTTP GET probes with a fixed timeout.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
}

struct ProbeResponse {
    status: u16,
    latency: TimeDelta,
}

impl Prober {
    /// Build a prober whose requests (body included) are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unexpected(error_detail(&e)))?;

        Ok(Self { client })
    }

    /// Probe one target. Never fails; errors become unhealthy outcomes.
    pub async fn check(&self, target: &ApplicationTarget) -> CheckOutcome {
        let checked_at = Utc::now();

        match self.fetch(&target.url).await {
            Ok(response) => {
                CheckOutcome::from_response(target, checked_at, response.status, response.latency)
            }
            Err(e) => {
                tracing::debug!("Probe failed for {} ({}): {}", target.name, target.url, e);
                CheckOutcome::failed(target, checked_at, &e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let server_date = response
            .headers()
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        // The exchange is only complete once the body has arrived. Chunks are
        // dropped as they come in.
        while response.chunk().await.map_err(classify_error)?.is_some() {}

        Ok(ProbeResponse {
            status,
            latency: latency_since(server_date, Utc::now()),
        })
    }
}

/// Map a client error onto the probe failure classes. Timeouts win over
/// connect errors so a connect that times out reports as a timeout.
fn classify_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        ProbeError::Transport(error_detail(&err))
    } else {
        ProbeError::Unexpected(error_detail(&err))
    }
}

/// Flatten an error and its sources into one line.
fn error_detail(err: &reqwest::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Parse an HTTP `Date` header (IMF-fixdate is a subset of RFC 2822).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Completion time minus the server-reported date, or zero without one.
pub fn latency_since(server_date: Option<DateTime<Utc>>, completed_at: DateTime<Utc>) -> TimeDelta {
    server_date
        .map(|date| completed_at - date)
        .unwrap_or_else(TimeDelta::zero)
}
