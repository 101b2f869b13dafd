//! Logging infrastructure - structured tracing throughout the boundary
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels per module
//! - Zero-cost when disabled
//! - Event-keyed fields for dispatch, bridge, and GC activity

use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

mod macros;
pub use macros::*;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // CAPI_BRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("CAPI_BRIDGE_LOG_LEVEL") {
            config.level = match level_str.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            };
        }

        // CAPI_BRIDGE_LOG_JSON: enable JSON format
        config.json_format = std::env::var("CAPI_BRIDGE_LOG_JSON").is_ok();

        // CAPI_BRIDGE_LOG_SPANS: show span events
        config.show_spans = std::env::var("CAPI_BRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Create high-performance config (minimal logging)
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            json_format: false,
            show_spans: false,
        }
    }
}

/// Initialize logging with default configuration
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "capi_bridge={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stdout)
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(cfg!(debug_assertions))
                    .with_line_number(cfg!(debug_assertions)),
            )
            .init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Boundary-specific logging functions
// ============================================================================

/// Log entry dispatch
#[inline]
pub fn log_dispatch(name: &str, arg_count: usize) {
    use tracing::trace;
    trace!(
        event = "dispatch",
        function = name,
        args = arg_count,
        "C-API entry dispatched"
    );
}

/// Log pending-exception translation to a native sentinel
pub fn log_sentinel(name: &str, error: &str) {
    use tracing::debug;
    debug!(
        event = "sentinel",
        function = name,
        error = error,
        "Host exception mapped to native sentinel"
    );
}

/// Log native pointer resolution through the bridge
#[inline]
pub fn log_bridge_resolve(address: usize) {
    use tracing::trace;
    trace!(
        event = "bridge_resolve",
        address = address,
        "Native pointer resolved to managed wrapper"
    );
}

/// Log lazy stub allocation for a managed-resident object
pub fn log_stub_alloc(address: usize) {
    use tracing::debug;
    debug!(
        event = "stub_alloc",
        address = address,
        "Native stub allocated for managed object"
    );
}

/// Log the ensure-weak cycle-breaking pass
pub fn log_ensure_weak(candidates: usize, downgraded: usize) {
    use tracing::debug;
    debug!(
        event = "ensure_weak",
        candidates = candidates,
        downgraded = downgraded,
        "Strong handles downgraded to weak"
    );
}

/// Log reference replication
pub fn log_replicate(address: usize, referents: usize) {
    use tracing::trace;
    trace!(
        event = "replicate",
        address = address,
        referents = referents,
        "Native reference graph replicated to managed heap"
    );
}

/// Log reference-queue reconciliation
pub fn log_queue_drain(removed: usize) {
    use tracing::debug;
    debug!(
        event = "queue_drain",
        removed = removed,
        "Stale bridge entries reconciled from reference queue"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &str) -> PerformanceGuard {
        PerformanceGuard {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: String,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            debug!(
                operation = %self.operation,
                duration_us = elapsed.as_micros(),
                "operation completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);

        let perf_config = LogConfig::performance();
        assert_eq!(perf_config.level, Level::ERROR);
    }

    #[test]
    fn test_init_idempotent() {
        init();
        init(); // Should not panic
        assert!(is_initialized());
    }
}
