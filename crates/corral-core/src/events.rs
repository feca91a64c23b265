//! Typed event payloads published on the event bus (§4.2).
//!
//! Events carry value snapshots, never aliases into mutable state -- a publisher
//! clones a `Device`/`Session` into the event and the bus clones it again per
//! subscriber, so nothing downstream can observe a future mutation.

use crate::device::Device;
use crate::session::Session;

/// The five event kinds §4.2 requires at minimum.
#[derive(Debug, Clone)]
pub enum Event {
    DeviceConnected { device: Device },
    DeviceDisconnected { device: Device },
    SessionStarted { device: Device, session: Session },
    SessionStopped { device: Device, session: Session },
    SessionFailed { device: Device, reason: String },
}

impl Event {
    /// The event's type name, used for logging and per-type subscriber dispatch.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::DeviceConnected { .. } => "DeviceConnected",
            Event::DeviceDisconnected { .. } => "DeviceDisconnected",
            Event::SessionStarted { .. } => "SessionStarted",
            Event::SessionStopped { .. } => "SessionStopped",
            Event::SessionFailed { .. } => "SessionFailed",
        }
    }

    /// The device this event concerns; every event kind carries one.
    pub fn device(&self) -> &Device {
        match self {
            Event::DeviceConnected { device }
            | Event::DeviceDisconnected { device }
            | Event::SessionStarted { device, .. }
            | Event::SessionStopped { device, .. }
            | Event::SessionFailed { device, .. } => device,
        }
    }
}
