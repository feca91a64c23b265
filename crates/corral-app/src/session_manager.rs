//! Session manager (C8, §4.8): per-device automation-server session, consisting of
//! a port lease from C4 plus the child process started from the platform's "start
//! automation server" script via C5.
//!
//! Session start/stop for the same device is serialized per §5 by a per-device
//! `tokio::sync::Mutex` held for the duration of `start_session`/`stop_session`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use corral_core::device::Device;
use corral_core::prelude::*;
use corral_core::session::{Session, SessionStatus};
use corral_core::{Config, MetricsSink};
use corral_daemon::port_allocator::PortAllocator;
use corral_daemon::process::ProcessHandle;
use tokio::sync::Mutex;

use crate::bus::EventBus;
use crate::device_registry::DeviceRegistry;

/// Where to find the platform start/stop scripts under `installFolder`, matching
/// §6's "install folder layout" contract (`Platform/<os>/Scripts/`).
fn script_path(install_folder: &std::path::Path, platform: &str, action: &str) -> PathBuf {
    let os = std::env::consts::OS;
    let ext = if cfg!(windows) { ".bat" } else { ".sh" };
    install_folder
        .join("Platform")
        .join(os)
        .join("Scripts")
        .join(format!("{platform}-{action}{ext}"))
}

struct RunningSession {
    session: Session,
    process: ProcessHandle,
}

/// Owns every live session and serializes start/stop per device.
pub struct SessionManager {
    config: Arc<Config>,
    allocator: Arc<PortAllocator>,
    registry: Arc<DeviceRegistry>,
    metrics: Arc<MetricsSink>,
    bus: EventBus,
    stop_grace: Duration,
    sessions: Mutex<HashMap<String, RunningSession>>,
}

impl SessionManager {
    pub fn new(
        config: Arc<Config>,
        allocator: Arc<PortAllocator>,
        registry: Arc<DeviceRegistry>,
        metrics: Arc<MetricsSink>,
        bus: EventBus,
        stop_grace: Duration,
    ) -> Self {
        Self {
            config,
            allocator,
            registry,
            metrics,
            bus,
            stop_grace,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// §4.8's `startSession`. Returns `None` (after recording the failure) on port
    /// exhaustion or launch failure; never panics on a bad device.
    pub async fn start_session(&self, device: &Device) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&device.id) {
            return sessions.get(&device.id).map(|s| s.session.clone());
        }

        let platform = device.platform.as_str();
        let port_count = self.config.ports_for_platform(platform) as usize;

        let Some(ports) = self.allocator.allocate(port_count) else {
            self.metrics.record_port_allocation_failure();
            self.fail(device, "NoPortsAvailable").await;
            return None;
        };

        let script = script_path(&self.config.install_folder, platform, "start");
        let mut env: HashMap<String, String> = HashMap::new();
        env.insert("DEVICE_ID".to_string(), device.id.clone());

        let args: Vec<String> = ports.iter().map(u16::to_string).collect();

        match ProcessHandle::launch(script.to_string_lossy().as_ref(), &args, &env, None) {
            Ok(process) => {
                let mut session = Session::new(device.id.clone(), ports);
                session.status = SessionStatus::Running;

                let mut device_with_session = device.clone();
                device_with_session.session = Some(session.clone());
                self.registry.add_or_update(device_with_session).await;

                self.metrics.record_session_started();
                self.bus.publish(corral_core::events::Event::SessionStarted {
                    device: device.clone(),
                    session: session.clone(),
                });
                info!("session {} started for device {}", session.session_id, device.id);

                sessions.insert(
                    device.id.clone(),
                    RunningSession {
                        session: session.clone(),
                        process,
                    },
                );
                Some(session)
            }
            Err(e) => {
                warn!("failed to launch automation server for {}: {e}", device.id);
                self.allocator.release(&ports);
                self.fail(device, "LaunchFailed").await;
                None
            }
        }
    }

    async fn fail(&self, device: &Device, reason: &str) {
        self.metrics.record_session_failed(reason);
        self.bus.publish(corral_core::events::Event::SessionFailed {
            device: device.clone(),
            reason: reason.to_string(),
        });
    }

    /// §4.8's `stopSession`: idempotent, always returns `true`. Ports are released
    /// even if the stop script itself errors.
    pub async fn stop_session(&self, device: &Device) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(mut running) = sessions.remove(&device.id) else {
            return true;
        };

        let platform = device.platform.as_str();
        let script = script_path(&self.config.install_folder, platform, "stop");
        let mut env: HashMap<String, String> = HashMap::new();
        env.insert("DEVICE_ID".to_string(), device.id.clone());
        let args: Vec<String> = running.session.ports.iter().map(u16::to_string).collect();

        if let Err(e) = ProcessHandle::launch(script.to_string_lossy().as_ref(), &args, &env, None) {
            warn!("stop script failed to launch for {}: {e}", device.id);
        }

        running.process.stop(self.stop_grace).await;
        self.allocator.release(&running.session.ports);

        running.session.status = SessionStatus::Stopped;
        if let Some(mut d) = self.registry.get(&device.id).await {
            d.session = None;
            self.registry.add_or_update(d).await;
        }

        self.metrics.record_session_stopped();
        self.bus.publish(corral_core::events::Event::SessionStopped {
            device: device.clone(),
            session: running.session.clone(),
        });
        info!("session {} stopped for device {}", running.session.session_id, device.id);

        true
    }

    /// Stops every live session, for orchestrator-root shutdown (§4.11). Failures
    /// for one device do not stop the sweep over the rest.
    pub async fn stop_all(&self) {
        let device_ids: Vec<String> = {
            let sessions = self.sessions.lock().await;
            sessions.keys().cloned().collect()
        };
        for device_id in device_ids {
            let device = match self.registry.get(&device_id).await {
                Some(d) => d,
                None => continue,
            };
            self.stop_session(&device).await;
        }
    }

    #[cfg(test)]
    pub async fn session_for(&self, device_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(device_id).map(|r| r.session.clone())
    }
}
