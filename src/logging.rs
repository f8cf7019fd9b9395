//! Structured logging backed by `tracing`.
//!
//! Installs a global subscriber once: stdout plus a daily-rotated file under
//! the user data directory.

use std::path::PathBuf;
use std::sync::{Once, OnceLock};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level of this crate's own targets when nothing is configured.
const DEFAULT_LEVEL: &str = "info";
/// Env var naming the level for `tugtrack` targets only.
const LEVEL_ENV: &str = "TUGTRACK_LOG_LEVEL";

static INIT_LOGGING: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn resolve_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tugtrack")
        .join("logs")
}

fn build_file_appender() -> Option<(RollingFileAppender, PathBuf)> {
    let log_dir = resolve_log_dir();
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "[tugtrack][WARN] Failed to create log directory {}: {}",
            log_dir.display(),
            err
        );
        return None;
    }

    Some((RollingFileAppender::new(Rotation::DAILY, &log_dir, "tugtrack.log"), log_dir))
}

/// `RUST_LOG`-style directives: this crate at `level`, dependencies at warn.
pub fn filter_directives(level: Option<&str>) -> String {
    let level = level
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LEVEL);
    format!("tugtrack={},warn", level.to_ascii_lowercase())
}

pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let (file_layer, log_dir) = if let Some((appender, dir)) = build_file_appender() {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(non_blocking);
            LOG_GUARD.set(guard).ok();
            (Some(layer), Some(dir))
        } else {
            (None, None)
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = std::env::var(LEVEL_ENV).ok();
            EnvFilter::try_new(filter_directives(level.as_deref()))
                .unwrap_or_else(|_| EnvFilter::new(filter_directives(None)))
        });

        let stdout_layer = fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339());

        let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);
        if let Some(file_layer) = file_layer {
            registry.with(file_layer).init();
        } else {
            registry.init();
        }

        match log_dir {
            Some(dir) => info!(
                "tugtrack {} logging initialized. Logs rotate daily under {}",
                env!("CARGO_PKG_VERSION"),
                dir.display()
            ),
            None => warn!("Structured logging initialized without file sink (stdout only)"),
        }
    });
}
