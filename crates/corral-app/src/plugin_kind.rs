//! Plugin kinds (C6, §4.6): `process` launches `executable + args` directly;
//! `script` wraps `executable` with an interpreter when `runtime` is set. Both
//! kinds expose the same capability set (`start`/`stop`/`checkHealth`); the
//! orchestrator (C7) drives that capability set using the command this module
//! resolves plus [`corral_daemon::process`].
//!
//! Kept as pure, side-effect-free resolution functions rather than a trait object
//! per kind: there are exactly two kinds and the only thing that differs between
//! them is how the executable/args become a program to run.

use std::collections::HashMap;
use std::path::PathBuf;

use corral_core::plugin_def::{HealthCheckSpec, PluginDefinition, PluginKind};
use corral_core::prelude::*;
use corral_core::Device;

/// Shared state handed to a plugin kind's `start`: the install folder plus
/// whatever variables the caller wants visible to the plugin (at minimum
/// `device`/`deviceId` for device-scoped instances, per §4.10).
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub install_folder: PathBuf,
    pub variables: HashMap<String, serde_json::Value>,
}

impl PluginContext {
    pub fn new(install_folder: PathBuf) -> Self {
        Self {
            install_folder,
            variables: HashMap::new(),
        }
    }

    /// A context carrying `device`/`deviceId`, as required for device-scoped
    /// instances (§4.7 step 2, §4.10).
    pub fn for_device(install_folder: PathBuf, device: &Device) -> Self {
        let mut ctx = Self::new(install_folder);
        ctx.variables.insert(
            "device".to_string(),
            serde_json::to_value(device).unwrap_or(serde_json::Value::Null),
        );
        ctx.variables
            .insert("deviceId".to_string(), serde_json::Value::String(device.id.clone()));
        ctx
    }
}

/// A resolved, ready-to-spawn command: program plus full argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Resolves the main start command for `def`, per §4.6: `process` runs the
/// executable directly; `script` wraps it with `runtime` when one is given. An
/// empty/blank executable is always a start-failure, for either kind.
pub fn resolve_main_command(def: &PluginDefinition) -> Result<ResolvedCommand> {
    resolve_command(def.executable.trim(), &def.args, def.runtime.as_deref(), def.kind)
}

/// Resolves the health-check command from `spec`, using `spec.runtime` (which may
/// differ from the main executable's runtime, per §4.6).
pub fn resolve_health_check_command(spec: &HealthCheckSpec) -> Result<ResolvedCommand> {
    resolve_command(spec.command.trim(), &spec.args, spec.runtime.as_deref(), PluginKind::Script)
}

fn resolve_command(
    executable: &str,
    args: &[String],
    runtime: Option<&str>,
    kind: PluginKind,
) -> Result<ResolvedCommand> {
    if executable.is_empty() {
        return Err(Error::plugin_start(
            "<unnamed>",
            format!("{kind:?} plugin has an empty executable"),
        ));
    }

    match runtime.map(str::trim).filter(|r| !r.is_empty()) {
        Some(runtime) => {
            let mut full_args = vec![executable.to_string()];
            full_args.extend(args.iter().cloned());
            Ok(ResolvedCommand {
                program: runtime.to_string(),
                args: full_args,
            })
        }
        None => Ok(ResolvedCommand {
            program: executable.to_string(),
            args: args.to_vec(),
        }),
    }
}
