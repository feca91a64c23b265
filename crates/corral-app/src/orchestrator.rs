//! Plugin orchestrator (C7, §4.7) -- the hardest subsystem. Owns every plugin
//! instance (static, keyed by plugin id, and device-scoped, keyed by
//! `pluginId:deviceId`) and drives each through the state machine, dependency
//! ordering, and health-monitor restart policy.
//!
//! Per-instance concurrency is serialized by holding each instance behind its own
//! `tokio::sync::Mutex` (§5: "at most one state-transition in flight at a time"),
//! while the instance map itself is an `RwLock` so lookups never block each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use corral_core::plugin_def::PluginDefinition;
use corral_core::prelude::*;
use corral_core::MetricsSink;
use corral_daemon::process::{self, ProcessHandle};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::plugin_kind::{resolve_health_check_command, resolve_main_command, PluginContext};
use crate::plugin_registry::PluginRegistry;

/// The eight states of §4.7's diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Disabled,
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Restarting,
    Failed,
}

/// Linear backoff capped at 10x the base (§9 open question 1's resolution).
const BACKOFF_CAP_MULTIPLIER: u32 = 10;

/// Result of a single `checkHealth` call. `Cancelled` is distinct from
/// `Unhealthy` so the health-monitor loop can skip counting it (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealthOutcome {
    Healthy,
    Unhealthy,
    Cancelled,
}

struct InstanceInner {
    state: PluginState,
    process: Option<ProcessHandle>,
    context: PluginContext,
    health_failures: u32,
    restart_count: u32,
    last_error: Option<String>,
}

/// A single plugin instance: its definition plus serialized, mutable runtime state.
pub struct PluginInstance {
    pub id: String,
    pub definition: PluginDefinition,
    inner: Mutex<InstanceInner>,
}

impl PluginInstance {
    fn new(id: String, definition: PluginDefinition, context: PluginContext) -> Self {
        Self {
            id,
            definition,
            inner: Mutex::new(InstanceInner {
                state: PluginState::Idle,
                process: None,
                context,
                health_failures: 0,
                restart_count: 0,
                last_error: None,
            }),
        }
    }

    pub async fn state(&self) -> PluginState {
        self.inner.lock().await.state
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }
}

/// Splits a `definitionId:deviceId` or plain `definitionId` instance key back into
/// its definition id.
fn definition_id_of(instance_key: &str) -> &str {
    instance_key.split(':').next().unwrap_or(instance_key)
}

/// Owns every plugin instance and the health-monitor loop.
pub struct PluginOrchestrator {
    registry: Arc<PluginRegistry>,
    metrics: Arc<MetricsSink>,
    install_folder: PathBuf,
    monitor_interval: Duration,
    stop_grace: Duration,
    cancel: CancellationToken,
    instances: RwLock<HashMap<String, Arc<PluginInstance>>>,
    static_order: Mutex<Vec<String>>,
}

impl PluginOrchestrator {
    pub fn new(
        registry: Arc<PluginRegistry>,
        metrics: Arc<MetricsSink>,
        install_folder: PathBuf,
        monitor_interval: Duration,
        stop_grace: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            metrics,
            install_folder,
            monitor_interval,
            stop_grace,
            cancel,
            instances: RwLock::new(HashMap::new()),
            static_order: Mutex::new(Vec::new()),
        }
    }

    pub async fn instance(&self, instance_key: &str) -> Option<Arc<PluginInstance>> {
        self.instances.read().await.get(instance_key).cloned()
    }

    /// Starts every enabled, `triggerOn=none` definition in `dependsOn` order
    /// (§4.7's "static plugins"). A dependency's failure marks its dependents
    /// `Failed` without attempting to start them.
    pub async fn start_static_plugins(&self) -> Result<()> {
        use corral_core::plugin_def::TriggerOn;

        let defs = self.registry.get_definitions().await;
        let static_defs: HashMap<String, PluginDefinition> = defs
            .into_iter()
            .filter(|(_, d)| d.enabled && d.trigger_on == TriggerOn::None)
            .collect();

        let order = topological_order(&static_defs)?;
        *self.static_order.lock().await = order.clone();

        let mut failed: std::collections::HashSet<String> = std::collections::HashSet::new();

        for id in order {
            let def = static_defs.get(&id).expect("topo order only names known ids").clone();

            let blocked = def.depends_on.iter().any(|dep| failed.contains(dep.trim()));
            if blocked {
                failed.insert(id.clone());
                let ctx = PluginContext::new(self.install_folder.clone());
                let instance = self.get_or_create_instance(id.clone(), def, ctx).await;
                let mut inner = instance.inner.lock().await;
                inner.state = PluginState::Failed;
                inner.last_error = Some("a dependency failed to start".to_string());
                continue;
            }

            let ctx = PluginContext::new(self.install_folder.clone());
            if self.start_instance(id.clone(), def, ctx).await.is_err() {
                failed.insert(id);
            }
        }

        Ok(())
    }

    /// Starts (or re-fetches an existing) instance of `definition_id`, scoped to
    /// `device_id` when given. Used both by `start_static_plugins` and by the
    /// device-event trigger (§4.10).
    pub async fn start_plugin(
        &self,
        definition_id: &str,
        device_id: Option<&str>,
        context: PluginContext,
    ) -> Result<()> {
        let def = self
            .registry
            .get(definition_id)
            .await
            .ok_or_else(|| Error::not_found(format!("plugin definition {definition_id:?}")))?;

        let key = match device_id {
            Some(device_id) => format!("{definition_id}:{device_id}"),
            None => definition_id.to_string(),
        };

        self.start_instance(key, def, context).await
    }

    async fn get_or_create_instance(
        &self,
        key: String,
        def: PluginDefinition,
        context: PluginContext,
    ) -> Arc<PluginInstance> {
        if let Some(existing) = self.instances.read().await.get(&key) {
            return existing.clone();
        }
        let mut instances = self.instances.write().await;
        instances
            .entry(key.clone())
            .or_insert_with(|| Arc::new(PluginInstance::new(key, def, context)))
            .clone()
    }

    /// §4.7's start protocol.
    async fn start_instance(&self, key: String, def: PluginDefinition, context: PluginContext) -> Result<()> {
        let instance = self.get_or_create_instance(key.clone(), def.clone(), context.clone()).await;

        for dep in &def.depends_on {
            let dep_running = match self.instances.read().await.get(dep.trim()) {
                Some(dep_instance) => matches!(dep_instance.state().await, PluginState::Running),
                None => false,
            };
            if !dep_running {
                let mut inner = instance.inner.lock().await;
                inner.state = PluginState::Failed;
                inner.last_error = Some(format!("dependency {dep:?} is not running"));
                return Err(Error::plugin_start(&key, format!("dependency {dep:?} is not running")));
            }
        }

        let mut inner = instance.inner.lock().await;
        inner.state = PluginState::Starting;
        inner.context = context;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            launch_plugin_process(&def)
        }));

        match outcome {
            Ok(Ok(handle)) => {
                inner.process = Some(handle);
                inner.state = PluginState::Running;
                inner.health_failures = 0;
                inner.last_error = None;
                info!("plugin {key} started");
                Ok(())
            }
            Ok(Err(e)) => {
                inner.state = PluginState::Failed;
                inner.last_error = Some(e.to_string());
                warn!("plugin {key} failed to start: {e}");
                Err(Error::plugin_start(&key, e.to_string()))
            }
            Err(_) => {
                inner.state = PluginState::Failed;
                inner.last_error = Some("start panicked".to_string());
                warn!("plugin {key} start panicked");
                Err(Error::plugin_start(&key, "start panicked"))
            }
        }
    }

    /// §4.7's stop protocol. A no-op (returning `Ok`) for any instance not
    /// currently `Running`/`Starting`, and for an unknown instance key.
    pub async fn stop_plugin(&self, instance_key: &str) -> Result<()> {
        let Some(instance) = self.instances.read().await.get(instance_key).cloned() else {
            return Ok(());
        };
        self.stop_instance(&instance).await
    }

    async fn stop_instance(&self, instance: &PluginInstance) -> Result<()> {
        let mut inner = instance.inner.lock().await;
        if !matches!(inner.state, PluginState::Running | PluginState::Starting) {
            return Ok(());
        }

        inner.state = PluginState::Stopping;
        if let Some(mut handle) = inner.process.take() {
            handle.stop(self.stop_grace).await;
        }
        inner.state = PluginState::Stopped;
        Ok(())
    }

    /// Stops every known instance in reverse static-start order; device-scoped
    /// instances of a definition are stopped alongside that definition. Failures
    /// are logged and do not abort the sweep.
    pub async fn stop_all(&self) {
        let order = self.static_order.lock().await.clone();
        let keys: Vec<String> = self.instances.read().await.keys().cloned().collect();

        let mut ordered_keys: Vec<String> = Vec::new();
        for def_id in order.iter().rev() {
            for key in &keys {
                if definition_id_of(key) == def_id && !ordered_keys.contains(key) {
                    ordered_keys.push(key.clone());
                }
            }
        }
        for key in &keys {
            if !ordered_keys.contains(key) {
                ordered_keys.push(key.clone());
            }
        }

        for key in ordered_keys {
            if let Some(instance) = self.instances.read().await.get(&key).cloned() {
                if let Err(e) = self.stop_instance(&instance).await {
                    warn!("error stopping plugin instance {key}: {e}");
                }
            }
        }
    }

    /// Runs the health-monitor loop until cancelled (§4.7's health monitor,
    /// §5's cancellation semantics). Intended to be spawned as its own task.
    pub async fn run_health_monitor(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("health monitor exiting on shutdown");
                    return;
                }
                _ = tokio::time::sleep(self.monitor_interval) => {}
            }

            let running_keys: Vec<String> = {
                let instances = self.instances.read().await;
                let mut keys = Vec::new();
                for (key, instance) in instances.iter() {
                    if matches!(instance.state().await, PluginState::Running) {
                        keys.push(key.clone());
                    }
                }
                keys
            };

            let mut checks = JoinSet::new();
            for key in running_keys {
                let this = self.clone();
                checks.spawn(async move { this.check_and_maybe_restart(&key).await });
            }
            while checks.join_next().await.is_some() {}
        }
    }

    async fn check_and_maybe_restart(&self, key: &str) {
        let Some(instance) = self.instances.read().await.get(key).cloned() else {
            return;
        };
        if !matches!(instance.state().await, PluginState::Running) {
            return;
        }

        let outcome = self.check_health(&instance).await;
        if outcome == HealthOutcome::Healthy {
            instance.inner.lock().await.health_failures = 0;
            return;
        }
        if outcome == HealthOutcome::Cancelled {
            // Counts as unhealthy for the purposes of this tick but must not move
            // the failure counter or the metric -- a shutdown-time cancellation
            // must never itself trigger a restart.
            return;
        }

        let threshold = instance
            .definition
            .health_check
            .as_ref()
            .map(|h| h.consecutive_failure_threshold)
            .unwrap_or(3)
            .max(1);

        let should_restart = {
            let mut inner = instance.inner.lock().await;
            inner.health_failures += 1;
            self.metrics.record_plugin_unhealthy(key);
            inner.health_failures >= threshold
        };

        if should_restart {
            self.restart_instance(key, &instance).await;
        }
    }

    /// Runs the instance's `checkHealth`: if there is no health-check command,
    /// healthy iff the child is still running; otherwise runs the command with its
    /// own timeout. Cancellation during the check counts as unhealthy without
    /// incrementing the counter (§5: "does not increment the unhealthy counter to
    /// avoid spurious restarts during shutdown") -- the caller distinguishes
    /// `Cancelled` from `Unhealthy` to honor that.
    async fn check_health(&self, instance: &PluginInstance) -> HealthOutcome {
        let Some(spec) = instance.definition.health_check.clone() else {
            let mut inner = instance.inner.lock().await;
            let running = inner.process.as_mut().map(|p| p.running()).unwrap_or(false);
            return if running { HealthOutcome::Healthy } else { HealthOutcome::Unhealthy };
        };

        let cmd = match resolve_health_check_command(&spec) {
            Ok(cmd) => cmd,
            Err(_) => return HealthOutcome::Unhealthy,
        };

        let timeout = Duration::from_secs(spec.timeout_seconds);
        tokio::select! {
            _ = self.cancel.cancelled() => HealthOutcome::Cancelled,
            outcome = process::run(&cmd.program, &cmd.args, &instance.definition.env, None, timeout) => {
                if matches!(outcome, Ok(o) if o.is_success()) {
                    HealthOutcome::Healthy
                } else {
                    HealthOutcome::Unhealthy
                }
            }
        }
    }

    async fn restart_instance(&self, key: &str, instance: &PluginInstance) {
        self.metrics.record_plugin_restart(key);

        let (restart_count, max_restarts, backoff_seconds, context) = {
            let mut inner = instance.inner.lock().await;
            inner.restart_count += 1;
            inner.health_failures = 0;
            (
                inner.restart_count,
                instance.definition.max_restarts,
                instance.definition.restart_backoff_seconds,
                inner.context.clone(),
            )
        };

        if restart_count > max_restarts {
            let mut inner = instance.inner.lock().await;
            inner.state = PluginState::Failed;
            inner.last_error = Some("max restarts exceeded".to_string());
            warn!("plugin {key} exhausted restarts, marking Failed");
            return;
        }

        {
            let mut inner = instance.inner.lock().await;
            inner.state = PluginState::Restarting;
        }

        let backoff = Duration::from_secs(backoff_seconds * u64::from(restart_count.min(BACKOFF_CAP_MULTIPLIER)));
        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }

        let _ = self.stop_instance(instance).await;
        let _ = self.start_instance(key.to_string(), instance.definition.clone(), context).await;
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.stop_all().await;
    }
}

fn launch_plugin_process(def: &PluginDefinition) -> Result<ProcessHandle> {
    let cmd = resolve_main_command(def)?;
    let cwd = def.working_dir.as_ref().map(std::path::Path::new);
    ProcessHandle::launch(&cmd.program, &cmd.args, &def.env, cwd)
}

/// Kahn's algorithm over `dependsOn` edges (dependency -> dependent). Errors on a
/// cycle rather than silently dropping the offending nodes, matching §4.7's
/// "cycles are rejected at registration time" (config-load already rejects them
/// too; this is a defensive second check against whatever the registry holds).
fn topological_order(defs: &HashMap<String, PluginDefinition>) -> Result<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = defs.keys().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for def in defs.values() {
        for dep in &def.depends_on {
            let dep = dep.trim();
            if defs.contains_key(dep) {
                *in_degree.entry(def.trimmed_id()).or_insert(0) += 1;
                dependents.entry(dep).or_default().push(def.trimmed_id());
            }
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_unstable();

    let mut order = Vec::with_capacity(defs.len());
    while let Some(id) = ready.pop() {
        order.push(id.to_string());
        if let Some(deps) = dependents.get(id) {
            let mut newly_ready = Vec::new();
            for dependent in deps {
                let deg = in_degree.get_mut(dependent).expect("known node");
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(*dependent);
                }
            }
            newly_ready.sort_unstable();
            ready.extend(newly_ready);
        }
    }

    if order.len() != defs.len() {
        return Err(Error::configuration(vec!["plugins.dependsOn has a cycle".to_string()]));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_core::plugin_def::{PluginKind, TriggerOn};
    use std::collections::HashMap as StdHashMap;

    fn def(id: &str, depends_on: &[&str], enabled: bool) -> PluginDefinition {
        PluginDefinition {
            id: id.to_string(),
            kind: PluginKind::Process,
            executable: "true".to_string(),
            args: Vec::new(),
            env: StdHashMap::new(),
            working_dir: None,
            runtime: None,
            health_check: None,
            trigger_on: TriggerOn::None,
            stop_on_disconnect: false,
            enabled,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            max_restarts: 1,
            restart_backoff_seconds: 1,
        }
    }

    fn orchestrator() -> (Arc<PluginOrchestrator>, Arc<PluginRegistry>) {
        let registry = Arc::new(PluginRegistry::new());
        let metrics = Arc::new(MetricsSink::new());
        let orch = Arc::new(PluginOrchestrator::new(
            registry.clone(),
            metrics,
            PathBuf::from("/tmp/corral-test"),
            Duration::from_secs(30),
            Duration::from_millis(200),
            CancellationToken::new(),
        ));
        (orch, registry)
    }

    fn orchestrator_with_handles() -> (Arc<PluginOrchestrator>, Arc<PluginRegistry>, Arc<MetricsSink>, CancellationToken) {
        let registry = Arc::new(PluginRegistry::new());
        let metrics = Arc::new(MetricsSink::new());
        let cancel = CancellationToken::new();
        let orch = Arc::new(PluginOrchestrator::new(
            registry.clone(),
            metrics.clone(),
            PathBuf::from("/tmp/corral-test"),
            Duration::from_secs(30),
            Duration::from_millis(200),
            cancel.clone(),
        ));
        (orch, registry, metrics, cancel)
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let mut defs = StdHashMap::new();
        defs.insert("a".to_string(), def("a", &[], true));
        defs.insert("b".to_string(), def("b", &["a"], true));
        defs.insert("c".to_string(), def("c", &["a", "b"], true));

        let order = topological_order(&defs).unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn topological_order_rejects_cycles() {
        let mut defs = StdHashMap::new();
        defs.insert("a".to_string(), def("a", &["b"], true));
        defs.insert("b".to_string(), def("b", &["a"], true));
        assert!(topological_order(&defs).is_err());
    }

    #[tokio::test]
    async fn static_plugins_start_in_dependency_order() {
        let (orch, registry) = orchestrator();
        registry.register_definition(def("a", &[], true)).await;
        registry.register_definition(def("b", &["a"], true)).await;

        orch.start_static_plugins().await.unwrap();

        assert_eq!(orch.instance("a").await.unwrap().state().await, PluginState::Running);
        assert_eq!(orch.instance("b").await.unwrap().state().await, PluginState::Running);
    }

    #[tokio::test]
    async fn disabled_definitions_are_never_instantiated() {
        let (orch, registry) = orchestrator();
        registry.register_definition(def("a", &[], false)).await;
        orch.start_static_plugins().await.unwrap();
        assert!(orch.instance("a").await.is_none());
    }

    #[tokio::test]
    async fn dependency_failure_marks_dependents_failed_without_starting() {
        let (orch, registry) = orchestrator();
        let mut broken = def("a", &[], true);
        broken.executable = "".to_string();
        registry.register_definition(broken).await;
        registry.register_definition(def("b", &["a"], true)).await;

        orch.start_static_plugins().await.unwrap();

        assert_eq!(orch.instance("a").await.unwrap().state().await, PluginState::Failed);
        assert_eq!(orch.instance("b").await.unwrap().state().await, PluginState::Failed);
    }

    #[tokio::test]
    async fn stop_plugin_on_unknown_key_is_a_no_op() {
        let (orch, _registry) = orchestrator();
        assert!(orch.stop_plugin("no-such-instance").await.is_ok());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (orch, registry) = orchestrator();
        registry.register_definition(def("a", &[], true)).await;
        orch.start_static_plugins().await.unwrap();

        orch.stop_plugin("a").await.unwrap();
        orch.stop_plugin("a").await.unwrap();

        let state = orch.instance("a").await.unwrap().state().await;
        assert!(matches!(state, PluginState::Stopped));
    }

    #[tokio::test]
    async fn device_scoped_instance_is_keyed_by_plugin_id_and_device_id() {
        let (orch, registry) = orchestrator();
        registry.register_definition(def("p", &[], true)).await;

        orch.start_plugin("p", Some("dev1"), PluginContext::new(PathBuf::from("/tmp")))
            .await
            .unwrap();

        assert!(orch.instance("p:dev1").await.is_some());
        assert!(orch.instance("p").await.is_none());
    }

    /// §8 S5: a health check that keeps failing drives `Running -> Restarting ->
    /// Starting -> Running` once, then `Failed` once `maxRestarts` is exhausted,
    /// and the monitor stops probing a `Failed` instance.
    #[tokio::test]
    async fn health_driven_restart_exhausts_max_restarts_then_stops_probing() {
        use corral_core::plugin_def::HealthCheckSpec;

        let install_dir = tempfile::tempdir().unwrap();
        let main_script = corral_daemon::test_utils::sleep_script(install_dir.path(), "main.sh", 30.0);
        let health_script =
            corral_daemon::test_utils::flaky_health_script(install_dir.path(), "health.sh", install_dir.path(), 100);

        let mut d = def("p", &[], true);
        d.executable = main_script.to_str().unwrap().to_string();
        d.max_restarts = 1;
        d.restart_backoff_seconds = 0;
        d.health_check = Some(HealthCheckSpec {
            command: health_script.to_str().unwrap().to_string(),
            args: Vec::new(),
            runtime: None,
            timeout_seconds: 5,
            interval_seconds: 1,
            consecutive_failure_threshold: 2,
        });

        let (orch, registry) = orchestrator();
        registry.register_definition(d).await;
        orch.start_static_plugins().await.unwrap();
        let instance = orch.instance("p").await.unwrap();
        assert_eq!(instance.state().await, PluginState::Running);

        // Two consecutive failures trip the threshold and restart succeeds
        // (restart_count 1 <= max_restarts 1).
        orch.check_and_maybe_restart("p").await;
        orch.check_and_maybe_restart("p").await;
        assert_eq!(instance.state().await, PluginState::Running);

        // Two more consecutive failures trip the threshold again; this restart
        // attempt pushes restart_count to 2, exceeding max_restarts.
        orch.check_and_maybe_restart("p").await;
        orch.check_and_maybe_restart("p").await;
        assert_eq!(instance.state().await, PluginState::Failed);

        // The monitor must not keep probing a Failed instance.
        orch.check_and_maybe_restart("p").await;
        assert_eq!(instance.state().await, PluginState::Failed);
    }

    /// §5: a shutdown cancellation arriving mid-health-check must not increment
    /// the unhealthy counter or the per-instance failure count, even though the
    /// check itself is treated as not-healthy for that tick.
    #[tokio::test]
    async fn cancelled_health_check_does_not_count_as_a_failure() {
        use corral_core::plugin_def::HealthCheckSpec;

        let install_dir = tempfile::tempdir().unwrap();
        let main_script = corral_daemon::test_utils::sleep_script(install_dir.path(), "main.sh", 30.0);
        let health_script = corral_daemon::test_utils::sleep_script(install_dir.path(), "health.sh", 30.0);

        let mut d = def("p", &[], true);
        d.executable = main_script.to_str().unwrap().to_string();
        d.health_check = Some(HealthCheckSpec {
            command: health_script.to_str().unwrap().to_string(),
            args: Vec::new(),
            runtime: None,
            timeout_seconds: 30,
            interval_seconds: 1,
            consecutive_failure_threshold: 1,
        });

        let (orch, registry, metrics, cancel) = orchestrator_with_handles();
        registry.register_definition(d).await;
        orch.start_static_plugins().await.unwrap();
        let instance = orch.instance("p").await.unwrap();
        assert_eq!(instance.state().await, PluginState::Running);

        cancel.cancel();
        orch.check_and_maybe_restart("p").await;

        assert_eq!(instance.state().await, PluginState::Running);
        assert_eq!(instance.inner.lock().await.health_failures, 0);
        assert_eq!(metrics.snapshot().plugin_unhealthy_total.get("p"), None);
    }
}
