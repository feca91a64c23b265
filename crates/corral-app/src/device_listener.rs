//! Device listener (C9, §4.9): a single cooperative tick loop that polls the
//! platform probes, diffs the result against the prior tick's snapshot, and
//! publishes `DeviceConnected`/`DeviceDisconnected` for whatever changed.
//!
//! Runs as one task for both platforms rather than one task per platform -- there
//! is only ever one prior-tick snapshot to diff against, and a single task keeps
//! that diff trivially race-free.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use corral_core::device::{Device, DeviceKind, DeviceState, Platform};
use corral_core::prelude::*;
use corral_core::{Event, MetricsSink};
use corral_daemon::probes::android::AndroidProbe;
use corral_daemon::probes::ios::IosProbe;
use corral_daemon::probes::{ProbeError, ProbedDevice};
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::device_registry::DeviceRegistry;

fn to_device(platform: Platform, probed: ProbedDevice) -> Device {
    Device {
        platform,
        id: probed.id,
        name: probed.name,
        kind: probed.kind,
        state: DeviceState::Connected,
        session: None,
    }
}

/// Polls both probes once, returning the device set visible this tick, keyed by id.
/// A platform whose probe reports a pairing failure keeps whatever the registry
/// already has for that platform (§4.9 step 2: "leave the prior snapshot unchanged
/// for the tick").
async fn poll_once(registry: &DeviceRegistry) -> HashMap<String, Device> {
    let mut seen = HashMap::new();

    if AndroidProbe::is_available() {
        match AndroidProbe::list().await {
            Ok(devices) => {
                for probed in devices {
                    let device = to_device(Platform::Android, probed);
                    seen.insert(device.id.clone(), device);
                }
            }
            Err(e) => warn!("android probe failed this tick: {e}"),
        }
    }

    if IosProbe::is_available() {
        match IosProbe::list().await {
            Ok(devices) => {
                for probed in devices {
                    let device = to_device(Platform::Ios, probed);
                    seen.insert(device.id.clone(), device);
                }
            }
            Err(ProbeError::PairingFailure(msg)) => {
                warn!("iOS device pairing/trust failure, leaving prior snapshot unchanged this tick: {msg}");
                for device in registry.get_all().await {
                    if device.platform == Platform::Ios && device.is_connected() {
                        seen.insert(device.id.clone(), device);
                    }
                }
            }
            Err(e) => warn!("ios probe failed this tick: {e}"),
        }
    }

    seen
}

/// Diffs `seen` (this tick's probe results) against the registry's currently
/// connected devices, applying §4.9 step 3: new devices are added and publish
/// `DeviceConnected`; devices no longer seen are removed (§3: disconnection is
/// terminal) and publish `DeviceDisconnected`.
async fn apply_tick(
    registry: &DeviceRegistry,
    bus: &EventBus,
    metrics: &MetricsSink,
    seen: &HashMap<String, Device>,
) {
    let previously_connected = registry.get_connected().await;

    for device in seen.values() {
        let was_connected = previously_connected.iter().any(|d| d.id == device.id);
        registry.add_or_update(device.clone()).await;
        if !was_connected {
            metrics.record_device_connected();
            info!("device connected: {} ({})", device.id, device.platform);
            bus.publish(Event::DeviceConnected { device: device.clone() });
        }
    }

    for device in previously_connected {
        if !seen.contains_key(&device.id) {
            registry.remove(&device.id).await;
            metrics.record_device_disconnected();
            info!("device disconnected: {} ({})", device.id, device.platform);
            bus.publish(Event::DeviceDisconnected { device });
        }
    }
}

/// Runs the tick loop until cancelled. Exits immediately (without ticking at all)
/// if neither probe is available at startup, per §4.9's "no platform tooling
/// installed" edge case.
pub async fn run(
    registry: Arc<DeviceRegistry>,
    bus: EventBus,
    metrics: Arc<MetricsSink>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    if !AndroidProbe::is_available() && !IosProbe::is_available() {
        warn!("neither adb nor idevice_id is available; device listener will not run");
        return;
    }

    loop {
        let seen = poll_once(&registry).await;
        apply_tick(&registry, &bus, &metrics, &seen).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("device listener exiting on shutdown");
                return;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}
