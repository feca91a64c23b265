//! Device registry (C3, §4.3): the authoritative in-memory map of currently-known
//! devices and their sessions.
//!
//! Reader-writer discipline per §5: many concurrent readers, exclusive writers.
//! `getConnected`/`getAll` hand back owned snapshots so callers never hold the lock
//! while iterating.

use std::collections::HashMap;

use corral_core::device::Device;
use tokio::sync::RwLock;

/// Keyed by device id. §3's invariant -- at most one entry per `(platform, id)` --
/// holds because `id` alone is the key and a device is only ever probed on one
/// platform at a time in practice; callers that need platform disambiguation can
/// still inspect `Device::platform` on the returned value.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `device`, replacing any prior entry with the same id.
    pub async fn add_or_update(&self, device: Device) {
        self.devices.write().await.insert(device.id.clone(), device);
    }

    pub async fn get(&self, id: &str) -> Option<Device> {
        self.devices.read().await.get(id).cloned()
    }

    /// Removes and returns the entry for `id`, if present.
    pub async fn remove(&self, id: &str) -> Option<Device> {
        self.devices.write().await.remove(id)
    }

    /// Snapshot of every device whose `state` is `connected`.
    pub async fn get_connected(&self) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| d.is_connected())
            .cloned()
            .collect()
    }

    /// Snapshot of every known device, regardless of state.
    pub async fn get_all(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }
}
