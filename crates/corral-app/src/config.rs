//! Configuration loader (A3, §4.14, §6): reads the JSON configuration document at
//! a given path, merges any `plugins.d/*.json` sibling files in lexicographic
//! filename order, and runs [`corral_core::Config::validate`] before handing the
//! result back. Unlike the teacher's settings loader, a load failure here is
//! always fatal -- there is no sensible default configuration for a device farm's
//! install folder, port range, or plugin set.

use std::path::{Path, PathBuf};

use corral_core::prelude::*;
use corral_core::Config;

/// Loads and validates the configuration at `path`. On any parse or validation
/// failure, returns `Error::Configuration` naming every violation found (§7).
pub async fn load(path: &Path) -> Result<Config> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::configuration(vec![format!("failed to read {}: {e}", path.display())]))?;

    let mut config: Config = serde_json::from_str(&raw)
        .map_err(|e| Error::configuration(vec![format!("failed to parse {}: {e}", path.display())]))?;

    if let Some(dir) = path.parent() {
        merge_plugins_d(dir, &mut config).await?;
    }

    let violations = config.validate();
    if !violations.is_empty() {
        return Err(Error::configuration(violations));
    }

    info!(
        "loaded configuration from {} ({} plugin definition(s))",
        path.display(),
        config.plugins.len()
    );
    Ok(config)
}

/// Appends every `*.json` file under `dir/plugins.d/`, read in lexicographic
/// filename order, to `config.plugins` (§6: "merged ... in lexicographic filename
/// order"). Each file holds a single plugin definition, matching the teacher's
/// settings-overlay convention of one concern per file.
async fn merge_plugins_d(dir: &Path, config: &mut Config) -> Result<()> {
    let plugins_dir = dir.join("plugins.d");
    if !plugins_dir.is_dir() {
        return Ok(());
    }

    let mut entries = tokio::fs::read_dir(&plugins_dir)
        .await
        .map_err(|e| Error::configuration(vec![format!("failed to read {}: {e}", plugins_dir.display())]))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::configuration(vec![format!("failed to read {}: {e}", plugins_dir.display())]))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::configuration(vec![format!("failed to read {}: {e}", path.display())]))?;
        let def = serde_json::from_str(&raw)
            .map_err(|e| Error::configuration(vec![format!("failed to parse {}: {e}", path.display())]))?;
        config.plugins.push(def);
    }

    Ok(())
}
