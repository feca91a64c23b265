//! # corral-core - Core Domain Types
//!
//! Foundation crate for the corral control plane. Provides domain types
//! (devices, sessions, plugin definitions, configuration), the crate-wide error
//! taxonomy, typed event payloads, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing, dirs, rand).
//!
//! ## Public API
//!
//! ### Data model
//! - [`Device`], [`Platform`], [`DeviceKind`], [`DeviceState`] - device identity (§3)
//! - [`Session`], [`SessionStatus`] - per-device automation-server session (§3)
//! - [`PluginDefinition`], [`PluginKind`], [`TriggerOn`], [`HealthCheckSpec`] - plugin config (§3)
//! - [`Config`], [`PortRange`] - the validated configuration value (§3.1, §6)
//!
//! ### Events (`events`)
//! - [`Event`] - the typed payloads published on the event bus (§4.2)
//!
//! ### Metrics (`metrics`)
//! - [`MetricsSink`], [`MetricsSnapshot`] - thread-safe counters and histograms (§4.1)
//!
//! ### Error handling (`error`)
//! - [`Error`] - crate-wide error enum with `is_fatal`/`is_recoverable` classification
//! - [`Result`] - type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - extension trait for adding logged context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use corral_core::prelude::*;
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod plugin_def;
pub mod session;

/// Prelude for common imports used throughout all corral crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use config::{Config, PortRange};
pub use device::{Device, DeviceKind, DeviceState, Platform};
pub use error::{Error, Result, ResultExt};
pub use events::Event;
pub use metrics::{MetricsSink, MetricsSnapshot};
pub use plugin_def::{HealthCheckSpec, PluginDefinition, PluginKind, TriggerOn};
pub use session::{Session, SessionStatus};

use rand::Rng;

/// Generates a short random id with the given prefix, e.g. `new_id("sess")` ->
/// `"sess-9f3a2c7b"`. Used for session ids; not cryptographically significant.
pub fn new_id(prefix: &str) -> String {
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| {
                let n: u8 = rng.gen_range(0..16);
                std::char::from_digit(n as u32, 16).unwrap()
            })
            .collect()
    };
    format!("{prefix}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_has_expected_shape() {
        let id = new_id("sess");
        assert!(id.starts_with("sess-"));
        assert_eq!(id.len(), "sess-".len() + 8);
    }

    #[test]
    fn new_id_is_not_constant() {
        let a = new_id("sess");
        let b = new_id("sess");
        assert_ne!(a, b);
    }
}
