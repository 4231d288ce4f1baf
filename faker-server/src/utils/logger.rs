//! Logging Infrastructure
//!
//! Console output, plus a daily rotating file when a log directory is given.

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, prelude::*};

/// Rotated file prefix, files are named `printer-faker.YYYY-MM-DD`
pub const LOG_FILE_PREFIX: &str = "printer-faker";

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when set.
/// The file layer is always plain text without ANSI colors.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    match log_dir {
        Some(dir) => {
            let log_dir = Path::new(dir);
            fs::create_dir_all(log_dir)?;

            let file_log = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
            let file_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file_log));

            subscriber.with(console_layer).with(file_layer).try_init()?;
        }
        None => subscriber.with(console_layer).try_init()?,
    }

    Ok(())
}
