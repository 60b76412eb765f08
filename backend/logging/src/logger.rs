//! Structured Logger
//!
//! Wraps `tracing` with a console layer and, when a log directory is given,
//! a JSON layer writing to a daily-rotated file.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` when set and valid, otherwise `level`, otherwise `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global structured logger.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger(log_dir: Option<&Path>, level: &str) {
    let env_filter = build_filter(level);

    // Rolling file appender: writes NDJSON to `<dir>/falabot.log.YYYY-MM-DD`
    let file_layer = log_dir.and_then(|dir| {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("falabot.log")
            .build(dir);
        match file_appender {
            Ok(appender) => Some(fmt::layer().json().with_writer(appender).with_ansi(false)),
            Err(e) => {
                eprintln!("falabot: file logging disabled for {}: {e}", dir.display());
                None
            }
        }
    });

    // Console goes to stderr; stdin/stdout belong to the operator.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
