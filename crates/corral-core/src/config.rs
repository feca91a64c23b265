//! The validated configuration value (§3.1, §6).
//!
//! `Config` is what the configuration loader (`corral-app::config`) produces after
//! parsing the JSON document, merging `plugins.d/*.json`, and running [`Config::validate`].
//! Nothing downstream reads the raw document -- only this struct.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::plugin_def::{PluginDefinition, PluginKind};

/// `portRange: {startPort, endPort}` with `startPort <= endPort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start_port: u16,
    pub end_port: u16,
}

impl PortRange {
    pub fn new(start_port: u16, end_port: u16) -> Self {
        Self { start_port, end_port }
    }

    pub fn is_ordered(&self) -> bool {
        self.start_port <= self.end_port
    }
}

fn default_ports_per_platform() -> HashMap<String, u32> {
    let mut m = HashMap::new();
    m.insert("android".to_string(), 2);
    m.insert("ios".to_string(), 3);
    m
}

/// Mirrors §6's table exactly; the one value every other component is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub install_folder: PathBuf,
    #[serde(default = "default_true")]
    pub enable_device_listener: bool,
    #[serde(default)]
    pub auto_start_appium: bool,
    #[serde(default = "default_poll_interval")]
    pub device_listener_poll_interval: u64,
    #[serde(default = "default_monitor_interval")]
    pub plugin_monitor_interval_seconds: u64,
    #[serde(default = "default_restart_backoff")]
    pub plugin_restart_backoff_seconds: u64,
    pub port_range: PortRange,
    /// Per-platform port count (§9 open question #2); defaults applied for any
    /// platform absent from the map.
    #[serde(default = "default_ports_per_platform")]
    pub ports_per_platform: HashMap<String, u32>,
    #[serde(default)]
    pub plugins: Vec<PluginDefinition>,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_restart_backoff() -> u64 {
    5
}

impl Config {
    /// Port count required for `platform`, falling back to the §9-resolved defaults
    /// (`android` -> 2, `ios` -> 3) when the platform is absent from the config map
    /// and not one of those two.
    pub fn ports_for_platform(&self, platform: &str) -> u32 {
        self.ports_per_platform
            .get(platform)
            .copied()
            .unwrap_or_else(|| match platform {
                "ios" => 3,
                _ => 2,
            })
    }

    /// Runs the full §7 validation pass, collecting *every* violation rather than
    /// stopping at the first. Returns an empty vec when the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.install_folder.as_os_str().is_empty() {
            violations.push("installFolder must not be empty".to_string());
        }

        if self.device_listener_poll_interval == 0 {
            violations.push("deviceListenerPollInterval must be > 0".to_string());
        }
        if self.plugin_monitor_interval_seconds == 0 {
            violations.push("pluginMonitorIntervalSeconds must be > 0".to_string());
        }
        if self.plugin_restart_backoff_seconds == 0 {
            violations.push("pluginRestartBackoffSeconds must be > 0".to_string());
        }

        if !self.port_range.is_ordered() {
            violations.push(format!(
                "portRange.startPort ({}) must be <= portRange.endPort ({})",
                self.port_range.start_port, self.port_range.end_port
            ));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for plugin in &self.plugins {
            let id = plugin.trimmed_id();
            if plugin.enabled {
                if id.is_empty() {
                    violations.push(format!(
                        "plugin with executable {:?} has an empty id",
                        plugin.executable
                    ));
                } else if !seen_ids.insert(id.to_string()) {
                    violations.push(format!("duplicate plugin id {id:?}"));
                }

                if matches!(plugin.kind, PluginKind::Process | PluginKind::Script)
                    && plugin.executable.trim().is_empty()
                {
                    violations.push(format!("plugin {id:?} has an empty executable"));
                }

                if let Some(hc) = &plugin.health_check {
                    if hc.timeout_seconds == 0 {
                        violations.push(format!(
                            "plugin {id:?} healthCheckTimeoutSeconds must be > 0"
                        ));
                    }
                    if hc.interval_seconds == 0 {
                        violations.push(format!(
                            "plugin {id:?} healthCheckIntervalSeconds must be > 0"
                        ));
                    }
                }
            }
        }

        if let Some(cycle) = find_dependency_cycle(&self.plugins) {
            violations.push(format!("plugins.dependsOn has a cycle: {}", cycle.join(" -> ")));
        }

        violations
    }
}

/// Depth-first cycle search over `dependsOn` edges. Returns the first cycle found
/// as a path of plugin ids, or `None` if the dependency graph is acyclic.
fn find_dependency_cycle(plugins: &[PluginDefinition]) -> Option<Vec<String>> {
    let by_id: HashMap<&str, &PluginDefinition> =
        plugins.iter().map(|p| (p.trimmed_id(), p)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a PluginDefinition>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                stack.push(id.to_string());
                return Some(stack.clone());
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id.to_string());

        if let Some(def) = by_id.get(id) {
            for dep in &def.depends_on {
                if let Some(cycle) = visit(dep.trim(), by_id, marks, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        marks.insert(id, Mark::Done);
        None
    }

    for plugin in plugins {
        let id = plugin.trimmed_id();
        if marks.get(id).is_none() {
            if let Some(cycle) = visit(id, &by_id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_def::{PluginDefinition, PluginKind, TriggerOn};

    fn base_config() -> Config {
        Config {
            install_folder: PathBuf::from("/opt/corral"),
            enable_device_listener: true,
            auto_start_appium: false,
            device_listener_poll_interval: 5,
            plugin_monitor_interval_seconds: 30,
            plugin_restart_backoff_seconds: 5,
            port_range: PortRange::new(4723, 4730),
            ports_per_platform: default_ports_per_platform(),
            plugins: Vec::new(),
        }
    }

    fn plugin(id: &str, depends_on: Vec<&str>) -> PluginDefinition {
        PluginDefinition {
            id: id.to_string(),
            kind: PluginKind::Process,
            executable: "noop".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            runtime: None,
            health_check: None,
            trigger_on: TriggerOn::None,
            stop_on_disconnect: false,
            enabled: true,
            depends_on: depends_on.into_iter().map(String::from).collect(),
            max_restarts: 5,
            restart_backoff_seconds: 5,
        }
    }

    #[test]
    fn valid_config_has_no_violations() {
        assert!(base_config().validate().is_empty());
    }

    #[test]
    fn empty_install_folder_is_a_violation() {
        let mut c = base_config();
        c.install_folder = PathBuf::new();
        assert!(c.validate().iter().any(|v| v.contains("installFolder")));
    }

    #[test]
    fn zero_poll_interval_is_a_violation() {
        let mut c = base_config();
        c.device_listener_poll_interval = 0;
        assert!(c.validate().iter().any(|v| v.contains("deviceListenerPollInterval")));
    }

    #[test]
    fn inverted_port_range_is_a_violation() {
        let mut c = base_config();
        c.port_range = PortRange::new(5000, 4000);
        assert!(c.validate().iter().any(|v| v.contains("portRange")));
    }

    #[test]
    fn disabled_plugin_with_empty_id_is_not_a_violation() {
        let mut c = base_config();
        let mut p = plugin("  ", vec![]);
        p.enabled = false;
        c.plugins.push(p);
        assert!(c.validate().is_empty());
    }

    #[test]
    fn enabled_plugin_with_empty_id_is_a_violation() {
        let mut c = base_config();
        c.plugins.push(plugin("  ", vec![]));
        assert!(c.validate().iter().any(|v| v.contains("empty id")));
    }

    #[test]
    fn enabled_plugin_with_empty_executable_is_a_violation() {
        let mut c = base_config();
        let mut p = plugin("appium", vec![]);
        p.executable = " ".to_string();
        c.plugins.push(p);
        assert!(c.validate().iter().any(|v| v.contains("empty executable")));
    }

    #[test]
    fn duplicate_plugin_ids_are_a_violation() {
        let mut c = base_config();
        c.plugins.push(plugin("appium", vec![]));
        c.plugins.push(plugin("appium", vec![]));
        assert!(c.validate().iter().any(|v| v.contains("duplicate")));
    }

    #[test]
    fn dependency_cycle_is_a_violation() {
        let mut c = base_config();
        c.plugins.push(plugin("a", vec!["b"]));
        c.plugins.push(plugin("b", vec!["a"]));
        assert!(c.validate().iter().any(|v| v.contains("cycle")));
    }

    #[test]
    fn acyclic_dependencies_pass() {
        let mut c = base_config();
        c.plugins.push(plugin("a", vec![]));
        c.plugins.push(plugin("b", vec!["a"]));
        c.plugins.push(plugin("c", vec!["a", "b"]));
        assert!(c.validate().is_empty());
    }

    #[test]
    fn ports_for_platform_uses_config_map_then_defaults() {
        let c = base_config();
        assert_eq!(c.ports_for_platform("android"), 2);
        assert_eq!(c.ports_for_platform("ios"), 3);
        assert_eq!(c.ports_for_platform("web"), 2);
    }

    #[test]
    fn health_check_timeouts_must_be_positive() {
        let mut c = base_config();
        let mut p = plugin("appium", vec![]);
        p.health_check = Some(crate::plugin_def::HealthCheckSpec {
            command: "curl".to_string(),
            args: vec![],
            runtime: None,
            timeout_seconds: 0,
            interval_seconds: 0,
            consecutive_failure_threshold: 3,
        });
        c.plugins.push(p);
        let violations = c.validate();
        assert!(violations.iter().any(|v| v.contains("healthCheckTimeoutSeconds")));
        assert!(violations.iter().any(|v| v.contains("healthCheckIntervalSeconds")));
    }
}
