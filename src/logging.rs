//! Logging setup: console output plus a daily log file.
//!
//! The file sink is best-effort. If the log directory is unusable the
//! service keeps running with console output only.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "healthwatch";
const LOG_FILE_SUFFIX: &str = "log";

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and closes the file writer.
pub fn init(log_path: &Path) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::from_default_env().add_directive("healthwatch=info".parse()?);

    let (file_layer, guard, file_error) = match open_log_file(log_path) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    if let Some(e) = file_error {
        tracing::warn!(
            "File logging disabled, cannot use {}: {}",
            log_path.display(),
            e
        );
    }

    Ok(guard)
}

fn open_log_file(log_path: &Path) -> Result<RollingFileAppender, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(log_path)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(log_path)?;

    Ok(appender)
}
