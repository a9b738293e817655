// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error injector — probabilistically fails incoming jobs with categorised,
// realistic-sounding errors.  Useful for exercising client retry paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use papertrap_core::error::{PapertrapError, Result};
use papertrap_core::types::CapturedJob;
use rand::Rng;
use serde_json::json;
use tracing::info;

use crate::api::{ConfigMap, ErrorCategory, HookVerdict, PluginMetadata, PrinterPlugin};
use crate::schema::{ConfigField, ConfigurationSchema, FieldType};

/// How the failing category is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InjectionMode {
    Random,
    Sequential,
    Specific,
}

impl InjectionMode {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "random" => Some(Self::Random),
            "sequential" => Some(Self::Sequential),
            "specific" => Some(Self::Specific),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct InjectorConfig {
    error_probability: f64,
    mode: InjectionMode,
    specific: ErrorCategory,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            error_probability: 0.3,
            mode: InjectionMode::Random,
            specific: ErrorCategory::Network,
        }
    }
}

/// Message pool per error category.  One entry is drawn uniformly.
fn message_pool(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Network => &[
            "connection reset by peer during spool transfer",
            "printer unreachable: no route to host",
            "TLS renegotiation with print endpoint timed out",
        ],
        ErrorCategory::Memory => &[
            "out of spool memory while rasterising page 1",
            "job exceeds available buffer space",
            "memory allocation failed in imaging pipeline",
        ],
        ErrorCategory::Format => &[
            "unsupported PDL construct at byte offset 512",
            "document stream ended unexpectedly",
            "page description could not be interpreted",
        ],
        ErrorCategory::Hardware => &[
            "paper jam in tray 2",
            "toner cartridge not detected",
            "fuser temperature out of range",
        ],
        ErrorCategory::Authorization => &[
            "user not permitted to print to this queue",
            "accounting quota exceeded for originating user",
            "job rejected by release-station policy",
        ],
        ErrorCategory::Queue => &[
            "queue is paused by operator",
            "maximum queued jobs reached",
            "job aborted during queue compaction",
        ],
    }
}

/// Fails a configurable fraction of jobs in `before_job_processing`.
pub struct ErrorInjectorPlugin {
    config: Mutex<InjectorConfig>,
    /// Cursor for sequential mode.
    sequence: AtomicUsize,
}

impl ErrorInjectorPlugin {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(InjectorConfig::default()),
            sequence: AtomicUsize::new(0),
        }
    }

    fn draw(&self) -> Option<(ErrorCategory, String)> {
        let config = self.config.lock().expect("injector config lock").clone();

        let mut rng = rand::thread_rng();
        if rng.r#gen::<f64>() >= config.error_probability {
            return None;
        }

        let category = match config.mode {
            InjectionMode::Random => {
                ErrorCategory::ALL[rng.gen_range(0..ErrorCategory::ALL.len())]
            }
            InjectionMode::Sequential => {
                let index = self.sequence.fetch_add(1, Ordering::Relaxed);
                ErrorCategory::ALL[index % ErrorCategory::ALL.len()]
            }
            InjectionMode::Specific => config.specific,
        };

        let pool = message_pool(category);
        let message = pool[rng.gen_range(0..pool.len())].to_string();
        Some((category, message))
    }
}

impl Default for ErrorInjectorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrinterPlugin for ErrorInjectorPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            id: "error-injector".into(),
            name: "Error Injector".into(),
            version: "1.0.0".into(),
            description: "Fails a configurable fraction of jobs with categorised errors".into(),
            author: "papertrap".into(),
            enabled: false,
            load_order: 20,
            dependencies: Vec::new(),
        }
    }

    async fn before_job_processing(&self, job: &CapturedJob) -> HookVerdict {
        match self.draw() {
            Some((category, message)) => {
                info!(
                    job_id = %job.id,
                    category = %category,
                    message = %message,
                    "error injector failing job"
                );
                HookVerdict::Error { category, message }
            }
            None => HookVerdict::Continue,
        }
    }

    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        Some(ConfigurationSchema::new(vec![
            ConfigField::new("errorProbability", "Error probability", FieldType::Number)
                .default_value(json!(0.3))
                .range(0.0, 1.0),
            ConfigField::new("mode", "Selection mode", FieldType::Select)
                .default_value(json!("random"))
                .options(vec!["random".into(), "sequential".into(), "specific".into()]),
            ConfigField::new("errorType", "Specific category", FieldType::Select)
                .default_value(json!("network"))
                .options(
                    ErrorCategory::ALL
                        .iter()
                        .map(|c| c.keyword().to_string())
                        .collect(),
                )
                .description("Used only when mode is \"specific\""),
        ]))
    }

    async fn update_configuration(&self, values: ConfigMap) -> Result<()> {
        let mut config = self.config.lock().expect("injector config lock");
        if let Some(p) = values.get("errorProbability").and_then(|v| v.as_f64()) {
            config.error_probability = p.clamp(0.0, 1.0);
        }
        if let Some(mode) = values.get("mode").and_then(|v| v.as_str()) {
            config.mode = InjectionMode::parse(mode).ok_or_else(|| {
                PapertrapError::PluginConfig(format!("unknown injection mode: {mode}"))
            })?;
        }
        if let Some(kind) = values.get("errorType").and_then(|v| v.as_str()) {
            config.specific = ErrorCategory::ALL
                .into_iter()
                .find(|c| c.keyword() == kind)
                .ok_or_else(|| {
                    PapertrapError::PluginConfig(format!("unknown error category: {kind}"))
                })?;
        }
        Ok(())
    }
}
