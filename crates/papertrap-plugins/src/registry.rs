// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plugin registry and hook chain execution.
//
// The registry owns every plugin instance.  Hook chains run strictly
// sequentially in ascending load order; each hook is bounded by its own
// deadline, and a hook that errors or times out is treated as if it had
// returned nothing — one misbehaving plugin never takes the chain down.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use papertrap_core::error::{PapertrapError, Result};
use papertrap_core::types::CapturedJob;
use papertrap_ipp::capabilities::merge_groups;
use papertrap_ipp::model::AttributeGroup;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::{
    ConfigMap, HookVerdict, PluginContext, PluginMetadata, PrinterPlugin, ProcessOutcome,
};

/// Deadline for `before_job_processing` hooks.
const BEFORE_HOOK_DEADLINE: Duration = Duration::from_secs(30);

/// Deadline for `process_job` hooks.
const PROCESS_HOOK_DEADLINE: Duration = Duration::from_secs(60);

/// Deadline for `customize_ipp_attributes` hooks.
const ATTRIBUTE_HOOK_DEADLINE: Duration = Duration::from_secs(10);

/// On-disk shape of `plugin_config.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedConfigurations {
    configurations: HashMap<String, ConfigMap>,
}

/// A registered plugin and its live state.
struct PluginEntry {
    plugin: Arc<dyn PrinterPlugin>,
    metadata: PluginMetadata,
    /// Last configuration applied, for persistence.
    config: ConfigMap,
}

/// Registry of all known plugins, keyed by id.
///
/// Readable concurrently from request tasks; mutated only by the
/// administrative load/unload/configure paths.
pub struct PluginRegistry {
    entries: RwLock<HashMap<String, PluginEntry>>,
    context: PluginContext,
    /// Path of `plugin_config.json`.
    config_path: PathBuf,
}

impl PluginRegistry {
    pub fn new(context: PluginContext) -> Self {
        let config_path = context.config_dir.join("plugin_config.json");
        Self {
            entries: RwLock::new(HashMap::new()),
            context,
            config_path,
        }
    }

    // -- Registration and lifecycle -----------------------------------------

    /// Register a plugin instance.  Registration does not load it; the
    /// plugin stays outside hook chains until [`load`] is called.
    pub async fn register(&self, plugin: Arc<dyn PrinterPlugin>) -> Result<()> {
        let mut metadata = plugin.metadata();
        metadata.enabled = false;
        let id = metadata.id.clone();

        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return Err(PapertrapError::Plugin {
                plugin: id,
                message: "already registered".into(),
            });
        }
        debug!(plugin = %id, load_order = metadata.load_order, "plugin registered");
        entries.insert(
            id,
            PluginEntry {
                plugin,
                metadata,
                config: ConfigMap::new(),
            },
        );
        Ok(())
    }

    /// Load (enable) a plugin after checking its dependencies are loaded.
    pub async fn load(&self, id: &str) -> Result<()> {
        let (plugin, dependencies) = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(id)
                .ok_or_else(|| PapertrapError::PluginNotFound(id.to_string()))?;
            if entry.metadata.enabled {
                return Ok(());
            }
            for dependency in &entry.metadata.dependencies {
                let loaded = entries
                    .get(dependency)
                    .map(|dep| dep.metadata.enabled)
                    .unwrap_or(false);
                if !loaded {
                    return Err(PapertrapError::PluginDependency {
                        plugin: id.to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }
            (Arc::clone(&entry.plugin), entry.metadata.dependencies.clone())
        };

        plugin.on_load(&self.context).await?;

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            entry.metadata.enabled = true;
        }
        info!(plugin = %id, deps = dependencies.len(), "plugin loaded");
        Ok(())
    }

    /// Unload (disable) a plugin.  Fails if a loaded plugin depends on it.
    pub async fn unload(&self, id: &str) -> Result<()> {
        let plugin = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(id)
                .ok_or_else(|| PapertrapError::PluginNotFound(id.to_string()))?;
            if !entry.metadata.enabled {
                return Ok(());
            }
            if let Some(dependent) = entries.values().find(|e| {
                e.metadata.enabled && e.metadata.dependencies.iter().any(|d| d == id)
            }) {
                return Err(PapertrapError::PluginDependency {
                    plugin: dependent.metadata.id.clone(),
                    dependency: id.to_string(),
                });
            }
            Arc::clone(&entry.plugin)
        };

        if let Err(err) = plugin.on_unload().await {
            warn!(plugin = %id, error = %err, "on_unload failed; unloading anyway");
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            entry.metadata.enabled = false;
        }
        info!(plugin = %id, "plugin unloaded");
        Ok(())
    }

    /// Metadata snapshot of every registered plugin, sorted by load order.
    pub async fn plugins(&self) -> Vec<PluginMetadata> {
        let entries = self.entries.read().await;
        let mut list: Vec<PluginMetadata> =
            entries.values().map(|e| e.metadata.clone()).collect();
        list.sort_by_key(|m| (m.load_order, m.id.clone()));
        list
    }

    // -- Configuration -------------------------------------------------------

    /// Validate and apply a configuration map, then persist all
    /// configurations to `plugin_config.json`.
    pub async fn configure(&self, id: &str, values: ConfigMap) -> Result<()> {
        let plugin = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(id)
                .ok_or_else(|| PapertrapError::PluginNotFound(id.to_string()))?;
            Arc::clone(&entry.plugin)
        };

        if let Some(schema) = plugin.configuration_schema() {
            schema.validate(&values)?;
        }
        plugin.update_configuration(values.clone()).await?;

        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(id) {
                entry.config = values;
            }
        }

        self.save_configurations().await?;
        info!(plugin = %id, "plugin configured");
        Ok(())
    }

    /// Load `plugin_config.json` and apply each stored configuration to
    /// its plugin.  Missing file means nothing to do; a stale entry for an
    /// unknown plugin is skipped.
    pub async fn load_configurations(&self) -> Result<()> {
        let text = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let persisted: PersistedConfigurations = serde_json::from_str(&text)?;

        for (id, values) in persisted.configurations {
            let plugin = {
                let entries = self.entries.read().await;
                entries.get(&id).map(|e| Arc::clone(&e.plugin))
            };
            let Some(plugin) = plugin else {
                warn!(plugin = %id, "stored configuration for unknown plugin skipped");
                continue;
            };
            if let Err(err) = plugin.update_configuration(values.clone()).await {
                warn!(plugin = %id, error = %err, "stored configuration rejected");
                continue;
            }
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(&id) {
                entry.config = values;
            }
        }

        debug!("plugin configurations reloaded");
        Ok(())
    }

    async fn save_configurations(&self) -> Result<()> {
        let persisted = {
            let entries = self.entries.read().await;
            PersistedConfigurations {
                configurations: entries
                    .iter()
                    .filter(|(_, e)| !e.config.is_empty())
                    .map(|(id, e)| (id.clone(), e.config.clone()))
                    .collect(),
            }
        };

        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(&persisted)?;
        tokio::fs::write(&self.config_path, text).await?;
        Ok(())
    }

    // -- Hook chains ---------------------------------------------------------

    /// Enabled plugins in ascending load order.
    async fn chain(&self) -> Vec<(String, Arc<dyn PrinterPlugin>)> {
        let entries = self.entries.read().await;
        let mut chain: Vec<(i32, String, Arc<dyn PrinterPlugin>)> = entries
            .values()
            .filter(|e| e.metadata.enabled)
            .map(|e| {
                (
                    e.metadata.load_order,
                    e.metadata.id.clone(),
                    Arc::clone(&e.plugin),
                )
            })
            .collect();
        chain.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        chain.into_iter().map(|(_, id, plugin)| (id, plugin)).collect()
    }

    /// Run the before-job chain.  The first `Reject` or `Error` verdict
    /// short-circuits; timeouts count as `Continue`.
    pub async fn run_before_hooks(&self, job: &CapturedJob) -> HookVerdict {
        for (id, plugin) in self.chain().await {
            match timeout(BEFORE_HOOK_DEADLINE, plugin.before_job_processing(job)).await {
                Ok(HookVerdict::Continue) => {}
                Ok(verdict) => {
                    info!(plugin = %id, job_id = %job.id, ?verdict, "before-hook short-circuited");
                    return verdict;
                }
                Err(_) => {
                    warn!(
                        plugin = %id,
                        job_id = %job.id,
                        limit_secs = BEFORE_HOOK_DEADLINE.as_secs(),
                        "before-hook timed out; continuing"
                    );
                }
            }
        }
        HookVerdict::Continue
    }

    /// Run the process chain.  The first plugin returning an outcome wins;
    /// the rest are skipped.
    pub async fn run_process_hooks(
        &self,
        job: &CapturedJob,
        document: &[u8],
    ) -> Option<(String, ProcessOutcome)> {
        for (id, plugin) in self.chain().await {
            match timeout(PROCESS_HOOK_DEADLINE, plugin.process_job(job, document)).await {
                Ok(Some(outcome)) => {
                    debug!(plugin = %id, job_id = %job.id, "process-hook produced a result");
                    return Some((id, outcome));
                }
                Ok(None) => {}
                Err(_) => {
                    warn!(
                        plugin = %id,
                        job_id = %job.id,
                        limit_secs = PROCESS_HOOK_DEADLINE.as_secs(),
                        "process-hook timed out; skipping"
                    );
                }
            }
        }
        None
    }

    /// Notify every plugin that a job finished.  Purely observational.
    pub async fn run_after_hooks(&self, job: &CapturedJob, success: bool) {
        for (_, plugin) in self.chain().await {
            plugin.after_job_processing(job, success).await;
        }
    }

    /// Fold the attribute-customisation chain over the composed groups.
    ///
    /// Each plugin sees the groups as customised so far; a returned
    /// replacement is merged name-by-name, so the last plugin to emit an
    /// attribute wins.
    pub async fn customize_attributes(
        &self,
        mut groups: Vec<AttributeGroup>,
    ) -> Vec<AttributeGroup> {
        for (id, plugin) in self.chain().await {
            match timeout(
                ATTRIBUTE_HOOK_DEADLINE,
                plugin.customize_ipp_attributes(&groups),
            )
            .await
            {
                Ok(Some(replacement)) => {
                    debug!(plugin = %id, groups = replacement.len(), "attributes customised");
                    merge_groups(&mut groups, replacement);
                }
                Ok(None) => {}
                Err(_) => {
                    warn!(
                        plugin = %id,
                        limit_secs = ATTRIBUTE_HOOK_DEADLINE.as_secs(),
                        "attribute hook timed out; skipping"
                    );
                }
            }
        }
        groups
    }

    /// Offer an operation name to each plugin until one claims it.
    pub async fn handle_custom_operation(
        &self,
        operation: &str,
        groups: &[AttributeGroup],
    ) -> bool {
        for (id, plugin) in self.chain().await {
            if plugin.handle_custom_operation(operation, groups).await {
                info!(plugin = %id, operation, "custom operation handled");
                return true;
            }
        }
        false
    }

    /// Offer an error to each plugin until one claims it.
    pub async fn handle_error(&self, error: &PapertrapError, context: &str) -> bool {
        for (_, plugin) in self.chain().await {
            if plugin.handle_error(error, context).await {
                return true;
            }
        }
        false
    }
}
