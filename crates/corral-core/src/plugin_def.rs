//! Plugin definition data model (§3) -- the configuration-shaped description of an
//! agent-managed auxiliary process. `PluginInstance` (the runtime state built from a
//! definition) lives in `corral-app` alongside the orchestrator that owns it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `kind ∈ {process, script}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Process,
    Script,
}

/// `triggerOn ∈ {device-connected, device-disconnected, none}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerOn {
    DeviceConnected,
    DeviceDisconnected,
    None,
}

impl TriggerOn {
    /// Parses case-insensitively, per §3 ("case-insensitive").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "device-connected" => Some(Self::DeviceConnected),
            "device-disconnected" => Some(Self::DeviceDisconnected),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Health-check command + timing thresholds for a plugin definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional interpreter to run `command` with; only meaningful for `script` kind.
    #[serde(default)]
    pub runtime: Option<String>,
    pub timeout_seconds: u64,
    pub interval_seconds: u64,
    #[serde(default = "default_failure_threshold")]
    pub consecutive_failure_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    3
}

/// A named, configuration-loaded plugin. `id` is trimmed and must be non-empty
/// (enforced by the config loader, not here -- this type only models the shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinition {
    pub id: String,
    pub kind: PluginKind,
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Only meaningful for `script` kind; wraps `executable` with an interpreter.
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,
    #[serde(default = "default_trigger_on", deserialize_with = "deserialize_trigger_on")]
    pub trigger_on: TriggerOn,
    #[serde(default)]
    pub stop_on_disconnect: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_seconds: u64,
}

fn default_trigger_on() -> TriggerOn {
    TriggerOn::None
}

fn default_true() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    5
}

fn default_restart_backoff() -> u64 {
    5
}

fn deserialize_trigger_on<'de, D>(deserializer: D) -> std::result::Result<TriggerOn, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    TriggerOn::parse(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown triggerOn value: {raw}")))
}

impl PluginDefinition {
    /// The trimmed id, used as the canonical key everywhere.
    pub fn trimmed_id(&self) -> &str {
        self.id.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_on_parses_case_insensitively() {
        assert_eq!(TriggerOn::parse("Device-Connected"), Some(TriggerOn::DeviceConnected));
        assert_eq!(TriggerOn::parse("DEVICE-DISCONNECTED"), Some(TriggerOn::DeviceDisconnected));
        assert_eq!(TriggerOn::parse("none"), Some(TriggerOn::None));
        assert_eq!(TriggerOn::parse("bogus"), None);
    }

    #[test]
    fn deserializes_minimal_json_definition_with_defaults() {
        let json = r#"{"id":"appium","kind":"process","executable":"appium"}"#;
        let def: PluginDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.trigger_on, TriggerOn::None);
        assert!(def.enabled);
        assert_eq!(def.max_restarts, 5);
        assert_eq!(def.restart_backoff_seconds, 5);
        assert!(def.depends_on.is_empty());
    }
}
