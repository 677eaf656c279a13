//! # relay-logging
//!
//! Structured logging with `tracing`.
//!
//! `RUST_LOG` always wins; otherwise the configured level directive is used.
//! Output is human-readable by default, or one JSON object per line.

#![deny(unsafe_code)]

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Error returned when the global subscriber cannot be installed.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already set.
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Build the filter: `RUST_LOG` if set, else `default_directive`.
pub fn build_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directive).map_err(|e| LoggingError::InvalidFilter {
        directive: default_directive.to_owned(),
        message: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_subscriber(default_directive: &str, json: bool) -> Result<(), LoggingError> {
    let filter = build_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))
}
