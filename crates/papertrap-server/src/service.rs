// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Top-level printer service.
//
// `PrinterService` owns every shared subsystem — plugin registry, job
// store, job table, custom attribute overrides, error simulation — and
// exposes the administrative API the host (CLI, UI, tests) drives.  The
// listener and dispatcher receive the shared state by reference; nothing
// in the process reaches for globals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use papertrap_core::config::{Preferences, ServerConfig};
use papertrap_core::error::{PapertrapError, Result};
use papertrap_core::events::{JobEventReceiver, JobEventSender, job_event_channel};
use papertrap_core::types::{CapturedJob, JobId, ServerStatus};
use papertrap_document::store::JobStore;
use papertrap_ipp::overrides::{CustomAttributeSet, parse_override_document};
use papertrap_plugins::api::{ConfigMap, PluginContext, PluginMetadata};
use papertrap_plugins::builtin::builtin_plugins;
use papertrap_plugins::registry::PluginRegistry;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::server::IppServer;

/// Faults the dispatcher can be forced to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    InternalError,
    NotPossible,
    DocumentFormatNotSupported,
    /// Canned response with the aborted job shape.
    AbortedJob,
}

/// Administrative error-simulation switch, read per request.
#[derive(Debug, Clone, Copy)]
pub struct ErrorSimulation {
    pub enabled: bool,
    pub fault: SimulatedFault,
}

impl Default for ErrorSimulation {
    fn default() -> Self {
        Self {
            enabled: false,
            fault: SimulatedFault::InternalError,
        }
    }
}

/// Allocates unique, monotonic job ids that fit a positive IPP integer.
///
/// Seeded from wall-clock milliseconds at startup so ids differ between
/// runs; the atomic counter keeps them unique under concurrency.
pub struct JobIdAllocator {
    next: AtomicU64,
}

impl JobIdAllocator {
    pub fn new() -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let seed = (now_ms % 100_000) * 10_000;
        Self {
            next: AtomicU64::new(seed.max(1)),
        }
    }

    pub fn next(&self) -> JobId {
        JobId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the listener, the dispatcher, and the admin API.
pub struct ServiceState {
    pub printer_name: RwLock<String>,
    /// Host part used when building printer and job URIs.
    pub host: String,
    pub port: u16,
    /// Stable `urn:uuid:` identity of this service instance.
    pub uuid_uri: String,
    pub started: Instant,
    pub registry: PluginRegistry,
    pub store: JobStore,
    /// In-memory job table; gone on restart by design.
    pub jobs: RwLock<HashMap<u64, CapturedJob>>,
    /// Atomically replaced attribute override document.
    pub custom_attributes: RwLock<Option<Arc<CustomAttributeSet>>>,
    pub error_simulation: RwLock<ErrorSimulation>,
    pub id_allocator: JobIdAllocator,
    pub events: JobEventSender,
    pub config_dir: PathBuf,
}

impl ServiceState {
    /// Current printer name (preferences override the configured default).
    pub async fn printer_name(&self) -> String {
        self.printer_name.read().await.clone()
    }

    pub async fn queued_job_count(&self) -> i32 {
        self.jobs.read().await.len() as i32
    }
}

/// The virtual printer application object.
pub struct PrinterService {
    state: Arc<ServiceState>,
    server: IppServer,
    config: ServerConfig,
}

impl PrinterService {
    /// Initialise the service: directories, event channel, plugin registry
    /// with the built-in set, persisted preferences, plugin configurations,
    /// and the selected attribute override document.
    pub async fn init(config: ServerConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.config_dir).await?;

        let (events, _) = job_event_channel();
        let store = JobStore::new(&config.job_dir, events.clone());
        store.ensure_dir().await?;

        let registry = PluginRegistry::new(PluginContext {
            config_dir: config.config_dir.clone(),
            job_dir: config.job_dir.clone(),
        });
        for plugin in builtin_plugins() {
            registry.register(plugin).await?;
        }
        registry.load_configurations().await?;

        let preferences = load_preferences(&config.config_dir).await;
        let printer_name = preferences
            .printer_name
            .clone()
            .unwrap_or_else(|| config.printer_name.clone());

        let state = Arc::new(ServiceState {
            printer_name: RwLock::new(printer_name),
            host: "localhost".into(),
            port: config.port,
            uuid_uri: format!("urn:uuid:{}", Uuid::new_v4()),
            started: Instant::now(),
            registry,
            store,
            jobs: RwLock::new(HashMap::new()),
            custom_attributes: RwLock::new(None),
            error_simulation: RwLock::new(ErrorSimulation::default()),
            id_allocator: JobIdAllocator::new(),
            events,
            config_dir: config.config_dir.clone(),
        });

        let service = Self {
            state,
            server: IppServer::new(config.port, config.advertise),
            config,
        };

        if let Some(path) = preferences.selected_attributes_file {
            if let Err(err) = service.apply_attributes_file(&path).await {
                warn!(path = %path.display(), error = %err, "stored attribute override not applied");
            }
        }

        info!("printer service initialised");
        Ok(service)
    }

    pub fn state(&self) -> Arc<ServiceState> {
        Arc::clone(&self.state)
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Start the IPP listener and, when configured, DNS-SD advertisement.
    pub async fn start(&mut self) -> Result<ServerStatus> {
        let name = self.state.printer_name().await;
        self.server.start(Arc::clone(&self.state), &name).await?;
        Ok(self.server.status())
    }

    /// Stop the listener and withdraw the advertisement.
    pub async fn stop(&mut self) -> Result<ServerStatus> {
        self.server.stop().await?;
        Ok(self.server.status())
    }

    pub fn status(&self) -> ServerStatus {
        self.server.status()
    }

    // -- Administrative API --------------------------------------------------

    /// Rename the printer and persist the preference.
    pub async fn set_printer_name(&self, name: &str) -> Result<()> {
        *self.state.printer_name.write().await = name.to_string();
        let mut preferences = load_preferences(&self.config.config_dir).await;
        preferences.printer_name = Some(name.to_string());
        save_preferences(&self.config.config_dir, &preferences).await?;
        info!(name, "printer renamed");
        Ok(())
    }

    pub async fn load_plugin(&self, id: &str) -> Result<()> {
        self.state.registry.load(id).await
    }

    pub async fn unload_plugin(&self, id: &str) -> Result<()> {
        self.state.registry.unload(id).await
    }

    /// Configure a plugin from a JSON object string.
    pub async fn configure_plugin(&self, id: &str, json: &str) -> Result<()> {
        let values: ConfigMap = serde_json::from_str(json)?;
        self.state.registry.configure(id, values).await
    }

    pub async fn plugins(&self) -> Vec<PluginMetadata> {
        self.state.registry.plugins().await
    }

    /// Import an attribute override document: copy it into
    /// `ipp_attributes/`, activate it, and persist the selection.
    pub async fn import_attributes(&self, path: &Path) -> Result<()> {
        let overrides_dir = self.config.config_dir.join("ipp_attributes");
        tokio::fs::create_dir_all(&overrides_dir).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| PapertrapError::Protocol("attribute path has no file name".into()))?;
        let target = overrides_dir.join(file_name);
        tokio::fs::copy(path, &target).await?;

        self.apply_attributes_file(&target).await?;

        let mut preferences = load_preferences(&self.config.config_dir).await;
        preferences.selected_attributes_file = Some(target.clone());
        save_preferences(&self.config.config_dir, &preferences).await?;

        info!(path = %target.display(), "attribute override imported");
        Ok(())
    }

    /// Drop the active attribute overrides.
    pub async fn clear_attributes(&self) -> Result<()> {
        *self.state.custom_attributes.write().await = None;
        let mut preferences = load_preferences(&self.config.config_dir).await;
        preferences.selected_attributes_file = None;
        save_preferences(&self.config.config_dir, &preferences).await?;
        Ok(())
    }

    /// Remove every captured artifact and forget all jobs.
    pub async fn clear_jobs(&self) -> Result<usize> {
        let removed = self.state.store.clear().await?;
        self.state.jobs.write().await.clear();
        Ok(removed)
    }

    /// Toggle forced-fault mode on the dispatcher.
    pub async fn set_error_simulation(&self, simulation: ErrorSimulation) {
        *self.state.error_simulation.write().await = simulation;
    }

    /// Subscribe to job-received events.
    pub fn subscribe(&self) -> JobEventReceiver {
        self.state.events.subscribe()
    }

    // -- Internal ------------------------------------------------------------

    async fn apply_attributes_file(&self, path: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(path).await?;
        let parsed = parse_override_document(&text)?;
        *self.state.custom_attributes.write().await = Some(Arc::new(parsed));
        Ok(())
    }
}

/// Preferences file inside the configuration directory.
const PREFERENCES_FILE: &str = "preferences.json";

async fn load_preferences(config_dir: &Path) -> Preferences {
    match tokio::fs::read_to_string(config_dir.join(PREFERENCES_FILE)).await {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Preferences::default(),
    }
}

async fn save_preferences(config_dir: &Path, preferences: &Preferences) -> Result<()> {
    tokio::fs::create_dir_all(config_dir).await?;
    let text = serde_json::to_string_pretty(preferences)?;
    tokio::fs::write(config_dir.join(PREFERENCES_FILE), text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> ServerConfig {
        ServerConfig {
            port: 0,
            printer_name: "Papertrap Test".into(),
            job_dir: dir.join("jobs"),
            config_dir: dir.join("config"),
            advertise: false,
        }
    }

    #[test]
    fn job_ids_are_unique_monotonic_and_ipp_safe() {
        let allocator = JobIdAllocator::new();
        let first = allocator.next();
        let second = allocator.next();
        assert!(second.0 > first.0);
        assert!(first.as_ipp_integer() > 0);
        assert_eq!(first.as_ipp_integer() as u64, first.0);
    }

    #[tokio::test]
    async fn init_registers_builtin_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let service = PrinterService::init(test_config(dir.path())).await.unwrap();

        let plugins = service.plugins().await;
        assert_eq!(plugins.len(), 5);
        assert!(plugins.iter().all(|p| !p.enabled));
        // Sorted by load order.
        assert_eq!(plugins[0].id, "delay-simulator");
        assert_eq!(plugins[4].id, "logging-enhancer");
    }

    #[tokio::test]
    async fn printer_name_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let service = PrinterService::init(test_config(dir.path())).await.unwrap();
        service.set_printer_name("Lab-A").await.unwrap();

        let service2 = PrinterService::init(test_config(dir.path())).await.unwrap();
        assert_eq!(service2.state().printer_name().await, "Lab-A");
    }

    #[tokio::test]
    async fn import_attributes_copies_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        let service = PrinterService::init(test_config(dir.path())).await.unwrap();

        let source = dir.path().join("override.json");
        std::fs::write(
            &source,
            r#"[ { "attributes": [ { "name": "printer-name", "value": "Imported", "type": "STRING" } ] } ]"#,
        )
        .unwrap();

        service.import_attributes(&source).await.unwrap();

        let active = service.state().custom_attributes.read().await.clone();
        let set = active.expect("overrides active");
        assert_eq!(set.printer.len(), 1);

        assert!(
            dir.path()
                .join("config/ipp_attributes/override.json")
                .exists()
        );

        // A fresh instance re-applies the stored selection.
        let service2 = PrinterService::init(test_config(dir.path())).await.unwrap();
        assert!(service2.state().custom_attributes.read().await.is_some());
    }

    #[tokio::test]
    async fn configure_plugin_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let service = PrinterService::init(test_config(dir.path())).await.unwrap();
        assert!(
            service
                .configure_plugin("delay-simulator", "not json")
                .await
                .is_err()
        );
    }
}
