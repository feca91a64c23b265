//! # corral-daemon - Process Supervision, Port Allocation, Device Probes
//!
//! Depends on [`corral_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Process supervision (C5, §4.5)
//! - [`ProcessHandle`] - launch/running/stop contract for opaque child processes
//! - [`run()`] - fire-and-wait variant used for health checks
//! - [`RunOutcome`] - exit code or timeout from `run()`
//!
//! ### Port allocator (C4, §4.4)
//! - [`PortAllocator`] - leases of `k` consecutive free TCP ports
//!
//! ### Device probes (§4.9)
//! - [`probes::android::AndroidProbe`] - ADB-like Android device enumeration
//! - [`probes::ios::IosProbe`] - libimobiledevice-like iOS device enumeration
//! - [`probes::ProbedDevice`], [`probes::ProbeError`]

pub mod port_allocator;
pub mod probes;
pub mod process;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use port_allocator::PortAllocator;
pub use probes::{ProbeError, ProbedDevice};
pub use process::{run, ProcessHandle, RunOutcome};
