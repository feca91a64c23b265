//! Platform device probes: opaque external CLIs enumerating attached devices of one
//! platform (§4.9). The device listener (`corral-app`) drives these and diffs their
//! output against the prior tick's snapshot; the probes themselves hold no state.

pub mod android;
pub mod ios;

use corral_core::device::DeviceKind;

/// One device as reported by a probe this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedDevice {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
}

/// A probe either returns its device set, reports it's not installed, or (iOS only)
/// reports a pairing/trust failure that the listener should log and otherwise ignore
/// for this tick, per §4.9 step 2.
#[derive(Debug)]
pub enum ProbeError {
    Unavailable,
    PairingFailure(String),
    Other(corral_core::Error),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Unavailable => write!(f, "probe tool not available"),
            ProbeError::PairingFailure(msg) => write!(f, "pairing/trust failure: {msg}"),
            ProbeError::Other(e) => write!(f, "{e}"),
        }
    }
}
