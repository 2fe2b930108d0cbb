//! Notification module.
//!
//! The cycle runner only knows the [`Notifier`] trait; e-mail delivery is
//! one implementation of it.

mod email;

pub use email::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::monitor::CycleReport;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("missing mail setting: {0}")]
    Config(&'static str),
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("failed to render template: {0}")]
    Template(#[from] askama::Error),
    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Delivers a report about an unhealthy cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &CycleReport) -> Result<(), NotifyError>;
}
