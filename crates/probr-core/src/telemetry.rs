//! Log subscriber setup for the `probr` binary.
//!
//! Logs go to stderr so that stdout stays free for run summaries. The level
//! comes from the `LogLevel` setting unless `RUST_LOG` is set, which wins.
//! Only the first initialisation in a process takes effect.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: plain text, or JSON lines when `json` is
/// set, filtered at `level`.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Map a configured `LogLevel` (`DEBUG`, `INFO`, `NOTICE`, `WARN`, `ERROR`)
/// to a tracing level. `NOTICE` has no tracing equivalent and maps to `INFO`;
/// unknown values fall back to `ERROR`.
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "INFO" | "NOTICE" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        _ => Level::ERROR,
    }
}
