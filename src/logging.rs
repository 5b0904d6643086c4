//! Logging setup for the binary.
//!
//! Library code only emits `tracing` events. The binary installs one fmt
//! subscriber writing to stderr, so stdout stays free for blob content.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::storage::{StorageError, StorageResult};

/// filter used when `RUST_LOG` is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "gitblob=debug"
    } else {
        "gitblob=info"
    }
}

/// build the filter: `RUST_LOG` wins, `-v` only moves the default
pub fn build_env_filter(verbose: bool) -> StorageResult<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid {}: {}", EnvFilter::DEFAULT_ENV, e))),
        _ => Ok(EnvFilter::new(default_directive(verbose))),
    }
}

/// install the global subscriber
pub fn init(verbose: bool) -> StorageResult<()> {
    let filter = build_env_filter(verbose)?;
    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| StorageError::InvalidConfig(format!("failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "gitblob=info");
        assert_eq!(default_directive(true), "gitblob=debug");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
        assert!(EnvFilter::try_new(default_directive(false)).is_ok());
    }
}
