//! Orchestrator root (C11, §4.11): wires up every component and drives startup
//! and shutdown in the order §5's concurrency model requires.
//!
//! Startup: metrics -> event bus -> registries -> port allocator -> plugin
//! orchestrator (static plugins) -> session manager -> device-event trigger ->
//! device listener. Shutdown runs the reverse: listener first (so no new events
//! arrive), then the plugin orchestrator (`stopAll`), then every session, with a
//! bounded grace period per step via a shared [`CancellationToken`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use corral_core::prelude::*;
use corral_core::{Config, MetricsSink};
use corral_daemon::port_allocator::PortAllocator;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::device_registry::DeviceRegistry;
use crate::orchestrator::PluginOrchestrator;
use crate::plugin_registry::PluginRegistry;
use crate::session_manager::SessionManager;
use crate::trigger::DeviceEventTrigger;

/// Every live component, held for the daemon's lifetime. Dropping this (after
/// `shutdown` completes) tears everything down.
pub struct OrchestratorRoot {
    pub config: Arc<Config>,
    pub metrics: Arc<MetricsSink>,
    pub bus: EventBus,
    pub device_registry: Arc<DeviceRegistry>,
    pub plugin_registry: Arc<PluginRegistry>,
    pub port_allocator: Arc<PortAllocator>,
    pub plugin_orchestrator: Arc<PluginOrchestrator>,
    pub session_manager: Arc<SessionManager>,
    cancel: CancellationToken,
    listener_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    health_monitor_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl OrchestratorRoot {
    /// Brings up every component and starts the background tasks (health monitor,
    /// device listener). Static plugins (§4.7) are started before the device
    /// listener begins ticking, so a device that is already connected at startup
    /// is handled consistently by the trigger rather than racing plugin startup.
    pub async fn start(config: Config) -> Result<Arc<Self>> {
        let config = Arc::new(config);
        let metrics = Arc::new(MetricsSink::new());
        let bus = EventBus::new();
        let device_registry = Arc::new(DeviceRegistry::new());
        let plugin_registry = Arc::new(PluginRegistry::new());
        let port_allocator = Arc::new(PortAllocator::from_config(&config));
        let cancel = CancellationToken::new();

        for def in &config.plugins {
            plugin_registry.register_definition(def.clone()).await;
        }

        let plugin_orchestrator = Arc::new(PluginOrchestrator::new(
            plugin_registry.clone(),
            metrics.clone(),
            config.install_folder.clone(),
            Duration::from_secs(config.plugin_monitor_interval_seconds),
            Duration::from_secs(5),
            cancel.clone(),
        ));

        let session_manager = Arc::new(SessionManager::new(
            config.clone(),
            port_allocator.clone(),
            device_registry.clone(),
            metrics.clone(),
            bus.clone(),
            Duration::from_secs(5),
        ));

        plugin_orchestrator.start_static_plugins().await?;

        DeviceEventTrigger::install(
            &bus,
            plugin_registry.clone(),
            plugin_orchestrator.clone(),
            config.install_folder.clone(),
        );

        if config.auto_start_appium {
            wire_session_manager(&bus, session_manager.clone());
        }

        let health_monitor_handle = {
            let orch = plugin_orchestrator.clone();
            Some(tokio::spawn(async move { orch.run_health_monitor().await }))
        };

        let listener_handle = if config.enable_device_listener {
            let registry = device_registry.clone();
            let bus = bus.clone();
            let listener_metrics = metrics.clone();
            let poll_interval = Duration::from_secs(config.device_listener_poll_interval);
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                crate::device_listener::run(registry, bus, listener_metrics, poll_interval, cancel).await
            }))
        } else {
            info!("device listener disabled by configuration");
            None
        };

        Ok(Arc::new(Self {
            config,
            metrics,
            bus,
            device_registry,
            plugin_registry,
            port_allocator,
            plugin_orchestrator,
            session_manager,
            cancel,
            listener_handle: tokio::sync::Mutex::new(listener_handle),
            health_monitor_handle: tokio::sync::Mutex::new(health_monitor_handle),
        }))
    }

    /// §4.11's shutdown order: stop the listener first (no new device events),
    /// then every plugin instance, then every session. `install_lock` (A5) is
    /// released by its own guard independently of this call.
    pub async fn shutdown(&self) {
        info!("orchestrator root shutting down");
        self.cancel.cancel();

        if let Some(handle) = self.listener_handle.lock().await.take() {
            let _ = handle.await;
        }

        self.plugin_orchestrator.shutdown().await;

        if let Some(handle) = self.health_monitor_handle.lock().await.take() {
            let _ = handle.await;
        }

        self.session_manager.stop_all().await;

        info!("orchestrator root shutdown complete");
    }

    pub fn install_folder(&self) -> PathBuf {
        self.config.install_folder.clone()
    }
}

/// Starts an automation-server session whenever a device connects and stops it on
/// disconnect. Only wired up when `config.auto_start_appium` is set; the caller is
/// responsible for that check.
fn wire_session_manager(bus: &EventBus, session_manager: Arc<SessionManager>) {
    use crate::bus::EventKind;
    use corral_core::Event;

    let started = session_manager.clone();
    bus.subscribe(EventKind::DeviceConnected, move |event| {
        if let Event::DeviceConnected { device } = event {
            let started = started.clone();
            tokio::spawn(async move {
                started.start_session(&device).await;
            });
        }
    });

    let stopped = session_manager;
    bus.subscribe(EventKind::DeviceDisconnected, move |event| {
        if let Event::DeviceDisconnected { device } = event {
            let stopped = stopped.clone();
            tokio::spawn(async move {
                stopped.stop_session(&device).await;
            });
        }
    });
}
