//! Configuration module for healthwatch.
//!
//! Everything is read from environment variables with sensible defaults.
//! Values are re-read at the point of use, so changes made to the process
//! environment take effect without a restart.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::monitor::TargetSource;
use crate::probe::{ApplicationTarget, DEFAULT_EXPECTED_STATUS};

pub const ENV_CHECK_INTERVAL_MINUTES: &str = "HEALTHWATCH_CHECK_INTERVAL_MINUTES";
pub const ENV_APPLICATIONS: &str = "HEALTHWATCH_APPLICATIONS";
pub const ENV_LOG_PATH: &str = "HEALTHWATCH_LOG_PATH";
pub const ENV_SMTP_SERVER: &str = "HEALTHWATCH_SMTP_SERVER";
pub const ENV_SMTP_PORT: &str = "HEALTHWATCH_SMTP_PORT";
pub const ENV_SMTP_USERNAME: &str = "HEALTHWATCH_SMTP_USERNAME";
pub const ENV_SMTP_PASSWORD: &str = "HEALTHWATCH_SMTP_PASSWORD";
pub const ENV_FROM_EMAIL: &str = "HEALTHWATCH_FROM_EMAIL";
pub const ENV_TO_EMAIL: &str = "HEALTHWATCH_TO_EMAIL";
pub const ENV_ENABLE_SSL: &str = "HEALTHWATCH_ENABLE_SSL";

const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 5;
/// One year.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 365 * 24 * 60;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_LOG_PATH: &str = "logs";

/// Configuration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed application entry '{entry}': {reason}")]
    MalformedApplication { entry: String, reason: String },
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Minutes between scheduled cycles (default: 5)
    pub check_interval_minutes: u64,
    /// Directory for daily log files (default: "logs")
    pub log_path: PathBuf,
    /// Rejected values, to be logged once a subscriber is installed
    pub warnings: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            warnings: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(minutes) = lookup(ENV_CHECK_INTERVAL_MINUTES) {
            match minutes.trim().parse::<u64>() {
                Ok(m) if (1..=MAX_CHECK_INTERVAL_MINUTES).contains(&m) => cfg.check_interval_minutes = m,
                _ => cfg.warnings.push(format!(
                    "Ignoring invalid {}='{}', using {} minutes",
                    ENV_CHECK_INTERVAL_MINUTES, minutes, DEFAULT_CHECK_INTERVAL_MINUTES
                )),
            }
        }

        if let Some(path) = lookup(ENV_LOG_PATH).filter(|p| !p.trim().is_empty()) {
            cfg.log_path = PathBuf::from(path);
        }

        cfg
    }

    /// Cycle period derived from `check_interval_minutes`.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }
}

/// Mail delivery settings, read fresh for every notification.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: Option<String>,
    /// SMTP port (default: 587)
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    /// Use STARTTLS (default: true)
    pub enable_ssl: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: None,
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from_email: None,
            to_email: None,
            enable_ssl: true,
        }
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from_email", &self.from_email)
            .field("to_email", &self.to_email)
            .field("enable_ssl", &self.enable_ssl)
            .finish()
    }
}

impl SmtpSettings {
    /// Load from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        cfg.server = non_empty(ENV_SMTP_SERVER);
        cfg.username = non_empty(ENV_SMTP_USERNAME);
        cfg.password = non_empty(ENV_SMTP_PASSWORD);
        cfg.from_email = non_empty(ENV_FROM_EMAIL);
        cfg.to_email = non_empty(ENV_TO_EMAIL);

        if let Some(port) = non_empty(ENV_SMTP_PORT).and_then(|p| p.trim().parse().ok()) {
            cfg.port = port;
        }

        if let Some(ssl) = non_empty(ENV_ENABLE_SSL).and_then(|s| s.trim().to_ascii_lowercase().parse().ok()) {
            cfg.enable_ssl = ssl;
        }

        cfg
    }
}

/// Parse `Name|url[|expectedStatus]` entries separated by `;`.
///
/// Entries with fewer than two fields are skipped. A third field that is not
/// a valid status code fails the whole list.
pub fn parse_applications(raw: &str) -> Result<Vec<ApplicationTarget>, ConfigError> {
    let mut targets = Vec::new();

    for entry in raw.split(';') {
        let parts: Vec<&str> = entry.split('|').collect();
        if parts.len() < 2 {
            continue;
        }

        let expected_status_code = match parts.get(2) {
            Some(code) => parse_status_code(code).ok_or_else(|| ConfigError::MalformedApplication {
                entry: entry.trim().to_string(),
                reason: format!("invalid expected status code '{}'", code.trim()),
            })?,
            None => DEFAULT_EXPECTED_STATUS,
        };

        targets.push(
            ApplicationTarget::new(parts[0].trim(), parts[1].trim())
                .with_expected_status(expected_status_code),
        );
    }

    Ok(targets)
}

fn parse_status_code(raw: &str) -> Option<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|code| (100..=999).contains(code))
}

/// Target source backed by `HEALTHWATCH_APPLICATIONS`, re-read on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvTargetSource;

impl TargetSource for EnvTargetSource {
    fn load_targets(&self) -> Result<Vec<ApplicationTarget>, ConfigError> {
        match env::var(ENV_APPLICATIONS) {
            Ok(raw) => parse_applications(&raw),
            Err(_) => Ok(Vec::new()),
        }
    }
}
