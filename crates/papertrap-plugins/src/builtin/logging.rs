// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Logging enhancer — structured start/completion records per job, with
// optional rolling performance aggregates.  Pure observer: never mutates
// a job or a document.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use papertrap_core::error::Result;
use papertrap_core::types::CapturedJob;
use serde_json::json;
use tracing::info;

use crate::api::{ConfigMap, HookVerdict, PluginMetadata, PrinterPlugin};
use crate::schema::{ConfigField, ConfigurationSchema, FieldType};

#[derive(Debug, Default)]
struct RollingStats {
    jobs_started: u64,
    jobs_completed: u64,
    jobs_failed: u64,
    bytes_total: u64,
    duration_total_ms: u128,
    /// Start instants of in-flight jobs, keyed by job id.
    in_flight: HashMap<u64, Instant>,
}

impl RollingStats {
    fn average_duration_ms(&self) -> u128 {
        let finished = (self.jobs_completed + self.jobs_failed) as u128;
        if finished == 0 {
            0
        } else {
            self.duration_total_ms / finished
        }
    }
}

/// Records job timings and throughput.
pub struct LoggingEnhancerPlugin {
    stats: Mutex<RollingStats>,
    track_performance: Mutex<bool>,
}

impl LoggingEnhancerPlugin {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(RollingStats::default()),
            track_performance: Mutex::new(true),
        }
    }
}

impl Default for LoggingEnhancerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrinterPlugin for LoggingEnhancerPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            id: "logging-enhancer".into(),
            name: "Logging Enhancer".into(),
            version: "1.0.0".into(),
            description: "Structured per-job logging with rolling throughput aggregates".into(),
            author: "papertrap".into(),
            enabled: false,
            load_order: 50,
            dependencies: Vec::new(),
        }
    }

    async fn before_job_processing(&self, job: &CapturedJob) -> HookVerdict {
        {
            let mut stats = self.stats.lock().expect("stats lock");
            stats.jobs_started += 1;
            stats.in_flight.insert(job.id.0, Instant::now());
        }
        info!(
            category = "PRINT_JOB",
            job_id = %job.id,
            name = %job.name,
            format = %job.document_format,
            size = job.size,
            user = %job.originating_user,
            "job processing started"
        );
        HookVerdict::Continue
    }

    async fn after_job_processing(&self, job: &CapturedJob, success: bool) {
        let track = *self.track_performance.lock().expect("track lock");

        let (elapsed_ms, average_ms) = {
            let mut stats = self.stats.lock().expect("stats lock");
            let elapsed_ms = stats
                .in_flight
                .remove(&job.id.0)
                .map(|start| start.elapsed().as_millis())
                .unwrap_or(0);
            if success {
                stats.jobs_completed += 1;
            } else {
                stats.jobs_failed += 1;
            }
            stats.bytes_total += job.size;
            stats.duration_total_ms += elapsed_ms;
            (elapsed_ms, stats.average_duration_ms())
        };

        let throughput_kib_s = if elapsed_ms > 0 {
            (job.size as f64 / 1024.0) / (elapsed_ms as f64 / 1000.0)
        } else {
            0.0
        };

        if track {
            info!(
                category = "PRINT_JOB",
                job_id = %job.id,
                success,
                elapsed_ms = elapsed_ms as u64,
                throughput_kib_s = format!("{throughput_kib_s:.1}"),
                rolling_avg_ms = average_ms as u64,
                "job processing finished"
            );
        } else {
            info!(
                category = "PRINT_JOB",
                job_id = %job.id,
                success,
                "job processing finished"
            );
        }
    }

    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        Some(ConfigurationSchema::new(vec![ConfigField::new(
            "trackPerformance",
            "Track performance aggregates",
            FieldType::Boolean,
        )
        .default_value(json!(true))]))
    }

    async fn update_configuration(&self, values: ConfigMap) -> Result<()> {
        if let Some(track) = values.get("trackPerformance").and_then(|v| v.as_bool()) {
            *self.track_performance.lock().expect("track lock") = track;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertrap_core::types::JobId;

    fn job(id: u64, size: u64) -> CapturedJob {
        let mut job = CapturedJob::new(
            JobId(id),
            "j".into(),
            "application/pdf".into(),
            "user".into(),
        );
        job.size = size;
        job
    }

    #[tokio::test]
    async fn aggregates_track_completions_and_failures() {
        let plugin = LoggingEnhancerPlugin::new();

        let first = job(1, 2048);
        plugin.before_job_processing(&first).await;
        plugin.after_job_processing(&first, true).await;

        let second = job(2, 1024);
        plugin.before_job_processing(&second).await;
        plugin.after_job_processing(&second, false).await;

        let stats = plugin.stats.lock().unwrap();
        assert_eq!(stats.jobs_started, 2);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.bytes_total, 3072);
        assert!(stats.in_flight.is_empty());
    }

    #[tokio::test]
    async fn completion_without_start_is_harmless() {
        let plugin = LoggingEnhancerPlugin::new();
        plugin.after_job_processing(&job(7, 10), true).await;
        let stats = plugin.stats.lock().unwrap();
        assert_eq!(stats.jobs_completed, 1);
    }
}
