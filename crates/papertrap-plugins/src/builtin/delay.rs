// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delay simulator — makes the virtual printer feel like a real, slow one.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use papertrap_core::error::Result;
use papertrap_core::types::CapturedJob;
use rand::Rng;
use serde_json::json;
use tracing::debug;

use crate::api::{ConfigMap, HookVerdict, PluginMetadata, PrinterPlugin};
use crate::schema::{ConfigField, ConfigurationSchema, FieldType};

/// Default pause before a job is accepted.
const DEFAULT_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
struct DelayConfig {
    delay_ms: u64,
    random_delay: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            random_delay: false,
        }
    }
}

/// Sleeps in `before_job_processing` for a fixed or randomised interval.
pub struct DelaySimulatorPlugin {
    config: Mutex<DelayConfig>,
}

impl DelaySimulatorPlugin {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(DelayConfig::default()),
        }
    }
}

impl Default for DelaySimulatorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrinterPlugin for DelaySimulatorPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            id: "delay-simulator".into(),
            name: "Delay Simulator".into(),
            version: "1.0.0".into(),
            description: "Delays incoming jobs to simulate slow hardware".into(),
            author: "papertrap".into(),
            enabled: false,
            load_order: 10,
            dependencies: Vec::new(),
        }
    }

    async fn before_job_processing(&self, job: &CapturedJob) -> HookVerdict {
        let config = self.config.lock().expect("delay config lock").clone();
        if config.delay_ms == 0 {
            return HookVerdict::Continue;
        }

        // Draw before the await point; the RNG handle is not Send.
        let actual_ms = if config.random_delay {
            let low = config.delay_ms / 2;
            let high = config.delay_ms + config.delay_ms / 2;
            rand::thread_rng().gen_range(low..high.max(low + 1))
        } else {
            config.delay_ms
        };

        debug!(job_id = %job.id, delay_ms = actual_ms, "delay simulator sleeping");
        tokio::time::sleep(Duration::from_millis(actual_ms)).await;
        HookVerdict::Continue
    }

    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        Some(ConfigurationSchema::new(vec![
            ConfigField::new("delayMs", "Delay (milliseconds)", FieldType::Number)
                .default_value(json!(DEFAULT_DELAY_MS))
                .range(0.0, 25_000.0)
                .description("Base pause applied before each job"),
            ConfigField::new("randomDelay", "Randomise delay", FieldType::Boolean)
                .default_value(json!(false))
                .description("Vary the pause between 50% and 150% of the base"),
        ]))
    }

    async fn update_configuration(&self, values: ConfigMap) -> Result<()> {
        let mut config = self.config.lock().expect("delay config lock");
        if let Some(ms) = values.get("delayMs").and_then(|v| v.as_u64()) {
            config.delay_ms = ms;
        }
        if let Some(random) = values.get("randomDelay").and_then(|v| v.as_bool()) {
            config.random_delay = random;
        }
        Ok(())
    }
}
