//! SMTP e-mail notifier with an HTML alert body.

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notifier, NotifyError};
use crate::config::SmtpSettings;
use crate::monitor::CycleReport;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

struct UnhealthyRow<'a> {
    name: &'a str,
    url: &'a str,
    status: String,
    message: &'a str,
    check_time: String,
}

struct StatusRow<'a> {
    name: &'a str,
    url: &'a str,
    healthy: bool,
    latency_ms: i64,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "alert_email.html")]
struct AlertEmail<'a> {
    alert_time: String,
    unhealthy_count: usize,
    unhealthy_rows: Vec<UnhealthyRow<'a>>,
    all_rows: Vec<StatusRow<'a>>,
}

/// Render the HTML body for an alert about `report`.
pub fn render_alert_body(report: &CycleReport) -> Result<String, askama::Error> {
    let unhealthy_rows = report
        .unhealthy_outcomes
        .iter()
        .map(|o| UnhealthyRow {
            name: &o.application_name,
            url: &o.url,
            status: o
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            message: &o.message,
            check_time: o.checked_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        })
        .collect();

    let all_rows = report
        .all_outcomes
        .iter()
        .map(|o| StatusRow {
            name: &o.application_name,
            url: &o.url,
            healthy: o.is_healthy,
            latency_ms: o.response_latency.num_milliseconds(),
            message: &o.message,
        })
        .collect();

    AlertEmail {
        alert_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        unhealthy_count: report.unhealthy_count(),
        unhealthy_rows,
        all_rows,
    }
    .render()
}

/// Build the alert message. `to_email` may hold several comma-separated addresses.
pub fn build_alert_message(settings: &SmtpSettings, report: &CycleReport) -> Result<Message, NotifyError> {
    let from = settings
        .from_email
        .as_deref()
        .ok_or(NotifyError::Config("from address"))?;
    let to = settings
        .to_email
        .as_deref()
        .ok_or(NotifyError::Config("to address"))?;

    let mut builder = Message::builder()
        .from(from.trim().parse::<Mailbox>()?)
        .subject(report.alert_subject())
        .header(ContentType::TEXT_HTML);

    for recipient in to.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        builder = builder.to(recipient.parse::<Mailbox>()?);
    }

    Ok(builder.body(render_alert_body(report)?)?)
}

/// Build the message and deliver it with the given settings.
pub async fn send_alert(settings: &SmtpSettings, report: &CycleReport) -> Result<(), NotifyError> {
    let server = settings
        .server
        .as_deref()
        .ok_or(NotifyError::Config("SMTP server"))?;
    let message = build_alert_message(settings, report)?;

    let builder = if settings.enable_ssl {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
    };

    let mut builder = builder.port(settings.port).timeout(Some(SMTP_TIMEOUT));
    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    builder.build().send(message).await?;
    Ok(())
}

/// E-mail notifier. Settings are read from the environment on every call.
#[derive(Debug, Clone, Default)]
pub struct EmailNotifier;

impl EmailNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, report: &CycleReport) -> Result<(), NotifyError> {
        let settings = SmtpSettings::load();
        send_alert(&settings, report).await?;

        tracing::info!(
            "Email notification sent to {}",
            settings.to_email.as_deref().unwrap_or_default()
        );
        Ok(())
    }
}
