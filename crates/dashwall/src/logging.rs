use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::LoggingConfig;

/// Overrides `logging.filter` when set.
pub const LOG_ENV: &str = "DASHWALL_LOG";

pub fn filter_directives(config: &LoggingConfig) -> String {
    match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => config.filter.clone(),
    }
}

/// Installs the global subscriber. Returns `false` when one was already set
/// (tests, embedding hosts).
pub fn init(config: &LoggingConfig) -> bool {
    let directives = filter_directives(config);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|err| {
        eprintln!("invalid log filter `{directives}`: {err}; falling back to `info`");
        EnvFilter::new("info")
    });

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
    installed.is_ok()
}
