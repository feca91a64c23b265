//! Plugin registry (C6, §4.6): named, configuration-loaded plugin definitions.
//!
//! IDs are trimmed; rejecting empty/whitespace-only ids is a config-load concern
//! (`corral-app::config`, §7) so this registry trusts whatever it is handed.

use std::collections::HashMap;

use corral_core::plugin_def::PluginDefinition;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct PluginRegistry {
    definitions: RwLock<HashMap<String, PluginDefinition>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `def` under its trimmed id, replacing any prior definition with that id.
    pub async fn register_definition(&self, def: PluginDefinition) {
        let id = def.trimmed_id().to_string();
        self.definitions.write().await.insert(id, def);
    }

    /// Snapshot of every registered definition, keyed by id.
    pub async fn get_definitions(&self) -> HashMap<String, PluginDefinition> {
        self.definitions.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<PluginDefinition> {
        self.definitions.read().await.get(id).cloned()
    }
}
