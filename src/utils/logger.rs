//! Logging setup
//!
//! Maps engine verbosity to the tracing subscriber configuration.

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::Verbosity;

fn tracing_level(verbosity: Verbosity) -> Level {
    match verbosity {
        Verbosity::Quiet => Level::WARN,
        Verbosity::Normal => Level::INFO,
        Verbosity::Loud => Level::DEBUG,
        Verbosity::Debug => Level::TRACE,
    }
}

/// Initialize the logger for the given verbosity. Call once at startup.
pub fn init_logger(verbosity: Verbosity) {
    let filter = EnvFilter::new(format!("simtest={}", tracing_level(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(tracing_level(Verbosity::Quiet), Level::WARN);
        assert_eq!(tracing_level(Verbosity::Normal), Level::INFO);
        assert_eq!(tracing_level(Verbosity::Loud), Level::DEBUG);
        assert_eq!(tracing_level(Verbosity::Debug), Level::TRACE);
    }
}
