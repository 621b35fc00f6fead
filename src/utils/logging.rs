//! Diagnostic logging. The terminal belongs to the chat UI, so tracing
//! output only goes to a file, and only when one is requested.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{prelude::*, EnvFilter};

/// Environment variable holding an `EnvFilter` directive, e.g. `parley=debug`.
pub const LOG_FILTER_ENV: &str = "PARLEY_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs a file-backed subscriber. Without a path nothing is installed and
/// every `tracing` macro is a no-op.
pub fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = filter_from_env(std::env::var(LOG_FILTER_ENV).ok().as_deref());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
    Ok(())
}

fn filter_from_env(directive: Option<&str>) -> EnvFilter {
    directive
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
