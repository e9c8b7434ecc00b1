//! Diagnostic logging setup. Filtering comes from `AZC_LOG` (an `EnvFilter`
//! directive, `warn` when unset); output goes to the `--log` file or stderr.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "AZC_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

pub fn env_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Fails when the log file cannot be opened
/// or a subscriber is already set.
pub fn init(log_file: Option<&Path>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = env_filter(std::env::var(LOG_ENV).ok().as_deref());
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    }
}
