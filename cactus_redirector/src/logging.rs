//! Logging initialization for the redirector binary.
//!
//! `RUST_LOG` wins when set; otherwise the given level applies, with
//! `debug` for the redirector itself. Logs go to stderr, or to a daily
//! rolling file when a log directory is given.

use std::{io::stderr, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as file logs should be flushed.
pub fn init_logging(log_level: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},cactus_redirector=debug")));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "cactus_redirector.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer().with_writer(writer).with_ansi(false))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer().with_writer(stderr).with_ansi(true))
                .try_init()?;
            Ok(None)
        }
    }
}
