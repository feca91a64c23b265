//! Device-event trigger (C10, §4.10): bridges the event bus to the plugin
//! orchestrator. Subscribes to `DeviceConnected`/`DeviceDisconnected` at
//! construction and starts/stops device-scoped plugin instances in response.
//!
//! Each device's callback runs on the bus's own per-subscriber task (§4.2), so two
//! devices connecting concurrently are handled concurrently; the orchestrator's
//! per-instance locking (§4.7) is what keeps a single instance's transitions
//! serialized.

use std::path::PathBuf;
use std::sync::Arc;

use corral_core::device::Device;
use corral_core::plugin_def::TriggerOn;
use corral_core::prelude::*;
use corral_core::Event;

use crate::bus::{EventBus, EventKind};
use crate::orchestrator::PluginOrchestrator;
use crate::plugin_kind::PluginContext;
use crate::plugin_registry::PluginRegistry;

/// Holds what `on_connected`/`on_disconnected` need; constructed once and kept
/// alive for the subscriptions' lifetime via the `Arc` captured in their closures.
pub struct DeviceEventTrigger {
    registry: Arc<PluginRegistry>,
    orchestrator: Arc<PluginOrchestrator>,
    install_folder: PathBuf,
}

impl DeviceEventTrigger {
    /// Subscribes to the bus and returns the trigger. Dropping the returned value
    /// does not unsubscribe; callers that need to stop reacting to events should
    /// keep the `SubscriptionHandle`s from `bus.subscribe` separately (the
    /// orchestrator root does not currently need to, since plugin teardown is
    /// driven by `stop_all` at shutdown rather than by unsubscribing).
    pub fn install(
        bus: &EventBus,
        registry: Arc<PluginRegistry>,
        orchestrator: Arc<PluginOrchestrator>,
        install_folder: PathBuf,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            registry,
            orchestrator,
            install_folder,
        });

        let connected = this.clone();
        bus.subscribe(EventKind::DeviceConnected, move |event| {
            if let Event::DeviceConnected { device } = event {
                let connected = connected.clone();
                tokio::spawn(async move { connected.on_connected(&device).await });
            }
        });

        let disconnected = this.clone();
        bus.subscribe(EventKind::DeviceDisconnected, move |event| {
            if let Event::DeviceDisconnected { device } = event {
                let disconnected = disconnected.clone();
                tokio::spawn(async move { disconnected.on_disconnected(&device).await });
            }
        });

        this
    }

    /// §4.10's `onConnected`: starts every enabled, `triggerOn=device-connected`
    /// definition, scoped to `device`.
    async fn on_connected(&self, device: &Device) {
        let defs = self.registry.get_definitions().await;
        for def in defs.values() {
            if def.enabled && def.trigger_on == TriggerOn::DeviceConnected {
                let ctx = PluginContext::for_device(self.install_folder.clone(), device);
                if let Err(e) = self
                    .orchestrator
                    .start_plugin(def.trimmed_id(), Some(&device.id), ctx)
                    .await
                {
                    warn!(
                        "device-connected trigger failed to start plugin {} for {}: {e}",
                        def.trimmed_id(),
                        device.id
                    );
                }
            }
        }
    }

    /// §4.10's `onDisconnected`: starts every enabled, `triggerOn=device-disconnected`
    /// definition scoped to `device`, then stops every `stopOnDisconnect` instance
    /// of `device`. Stopping an instance that never started is a no-op (the
    /// orchestrator's `stop_plugin` ignores unknown keys).
    async fn on_disconnected(&self, device: &Device) {
        let defs = self.registry.get_definitions().await;

        for def in defs.values() {
            if def.enabled && def.trigger_on == TriggerOn::DeviceDisconnected {
                let ctx = PluginContext::for_device(self.install_folder.clone(), device);
                if let Err(e) = self
                    .orchestrator
                    .start_plugin(def.trimmed_id(), Some(&device.id), ctx)
                    .await
                {
                    warn!(
                        "device-disconnected trigger failed to start plugin {} for {}: {e}",
                        def.trimmed_id(),
                        device.id
                    );
                }
            }
        }

        for def in defs.values() {
            if def.stop_on_disconnect {
                let key = format!("{}:{}", def.trimmed_id(), device.id);
                if let Err(e) = self.orchestrator.stop_plugin(&key).await {
                    warn!("failed to stop {key} on device disconnect: {e}");
                }
            }
        }
    }
}
