//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds from the error-handling design: `Configuration` is the only fatal
//! kind (it aborts startup), everything else is recovered locally by its owning
//! component and only ever logged/counted.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type, organized by the domain sections it serves.
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Infrastructure
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // ConfigurationError -- fatal, aborts startup
    // ─────────────────────────────────────────────────────────────
    #[error("configuration invalid: {}", .violations.join("; "))]
    Configuration { violations: Vec<String> },

    // ─────────────────────────────────────────────────────────────
    // TransientSubsystemError -- recoverable, counted, never fatal
    // ─────────────────────────────────────────────────────────────
    #[error("no ports available for platform {platform}")]
    PortExhausted { platform: String },

    #[error("failed to launch process: {reason}")]
    ProcessLaunch { reason: String },

    #[error("health check for plugin {plugin_id} timed out")]
    HealthCheckTimedOut { plugin_id: String },

    // ─────────────────────────────────────────────────────────────
    // PluginStartError
    // ─────────────────────────────────────────────────────────────
    #[error("plugin {plugin_id} failed to start: {reason}")]
    PluginStart { plugin_id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // TriggerError -- logged only, never propagated past the bus
    // ─────────────────────────────────────────────────────────────
    #[error("subscriber for plugin {plugin_id} failed: {reason}")]
    Trigger { plugin_id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Misc
    // ─────────────────────────────────────────────────────────────
    #[error("channel closed unexpectedly")]
    ChannelClosed,

    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn configuration(violations: Vec<String>) -> Self {
        Self::Configuration { violations }
    }

    pub fn port_exhausted(platform: impl Into<String>) -> Self {
        Self::PortExhausted {
            platform: platform.into(),
        }
    }

    pub fn process_launch(reason: impl Into<String>) -> Self {
        Self::ProcessLaunch {
            reason: reason.into(),
        }
    }

    pub fn health_check_timed_out(plugin_id: impl Into<String>) -> Self {
        Self::HealthCheckTimedOut {
            plugin_id: plugin_id.into(),
        }
    }

    pub fn plugin_start(plugin_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginStart {
            plugin_id: plugin_id.into(),
            reason: reason.into(),
        }
    }

    pub fn trigger(plugin_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Trigger {
            plugin_id: plugin_id.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether this error aborts the process. Only configuration errors do.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Whether the owning component should recover locally (log, count, retry) rather
    /// than propagate further. True for everything except configuration errors.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

/// Extension trait for adding context to Results, logging as it goes.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {}", context.into(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_is_the_only_fatal_kind() {
        assert!(Error::configuration(vec!["installFolder empty".into()]).is_fatal());
        assert!(!Error::port_exhausted("android").is_fatal());
        assert!(!Error::process_launch("boom").is_fatal());
        assert!(!Error::health_check_timed_out("p1").is_fatal());
        assert!(!Error::plugin_start("p1", "boom").is_fatal());
        assert!(!Error::trigger("p1", "boom").is_fatal());
    }

    #[test]
    fn recoverable_is_the_inverse_of_fatal() {
        let err = Error::port_exhausted("ios");
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn configuration_message_lists_all_violations() {
        let err = Error::configuration(vec!["a missing".into(), "b invalid".into()]);
        let msg = err.to_string();
        assert!(msg.contains("a missing"));
        assert!(msg.contains("b invalid"));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
