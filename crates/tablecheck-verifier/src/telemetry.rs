//! Logging setup shared by the binaries

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Variable selecting the log level
pub const LOG_LEVEL_VAR: &str = "TABLECHECK_LOG_LEVEL";

/// Parse a level name, falling back to `info`
pub fn parse_level(value: Option<&str>) -> Level {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(Level::INFO)
}

/// Install the global fmt subscriber at `level`
///
/// Returns false if a subscriber was already installed.
pub fn init(level: Level) -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// Install the subscriber at the level named by `TABLECHECK_LOG_LEVEL`
pub fn init_from_env() -> bool {
    init(parse_level(std::env::var(LOG_LEVEL_VAR).ok().as_deref()))
}
