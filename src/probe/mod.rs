//! Probe module for application health checks.
//!
//! A probe is one HTTP GET against one application endpoint. Every failure
//! mode is folded into the returned [`CheckOutcome`]; nothing escapes.

mod http;

pub use http::*;

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout applied to every probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Status code treated as healthy when a target does not name one.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Probe failure classes. The `Display` form is the outcome message.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Connection failed: {0}")]
    Transport(String),
    #[error("Request timeout")]
    Timeout,
    #[error("Error: {0}")]
    Unexpected(String),
}

/// One monitored application endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationTarget {
    pub name: String,
    pub url: String,
    pub expected_status_code: u16,
}

impl ApplicationTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            expected_status_code: DEFAULT_EXPECTED_STATUS,
        }
    }

    pub fn with_expected_status(mut self, code: u16) -> Self {
        self.expected_status_code = code;
        self
    }
}

/// Result of probing one target.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub application_name: String,
    pub url: String,
    /// True iff a response arrived and its status equals the expected code.
    pub is_healthy: bool,
    /// Observed status, `None` when no response was received.
    pub status_code: Option<u16>,
    pub message: String,
    /// Local completion time minus the server's `Date` header; zero without one.
    /// Clock-skew sensitive and possibly negative.
    pub response_latency: TimeDelta,
    pub checked_at: DateTime<Utc>,
}

impl CheckOutcome {
    /// Outcome for a probe that received a response.
    pub fn from_response(
        target: &ApplicationTarget,
        checked_at: DateTime<Utc>,
        status_code: u16,
        response_latency: TimeDelta,
    ) -> Self {
        Self {
            application_name: target.name.clone(),
            url: target.url.clone(),
            is_healthy: status_code == target.expected_status_code,
            status_code: Some(status_code),
            message: status_message(status_code),
            response_latency,
            checked_at,
        }
    }

    /// Outcome for a probe that never got a response.
    pub fn failed(target: &ApplicationTarget, checked_at: DateTime<Utc>, err: &ProbeError) -> Self {
        Self {
            application_name: target.name.clone(),
            url: target.url.clone(),
            is_healthy: false,
            status_code: None,
            message: err.to_string(),
            response_latency: TimeDelta::zero(),
            checked_at,
        }
    }
}

/// "OK" for the 2xx range, the numeric code otherwise. Deliberately
/// independent of the expected-code verdict.
pub fn status_message(status_code: u16) -> String {
    if (200..300).contains(&status_code) {
        "OK".to_string()
    } else {
        format!("Status code: {}", status_code)
    }
}
