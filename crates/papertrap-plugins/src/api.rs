// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The plugin contract.
//
// Plugins observe and influence job processing through a fixed set of
// hooks.  Hooks return result variants instead of raising: a failing
// plugin can reject a job or report an error category, but it can never
// abort the chain by panicking its way out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use papertrap_core::error::Result;
use papertrap_core::types::CapturedJob;
use papertrap_ipp::model::AttributeGroup;
use serde::{Deserialize, Serialize};

use crate::schema::ConfigurationSchema;

/// Scalar configuration values as stored in `plugin_config.json`.
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// Identity and ordering information for a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique key within the registry.
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    /// Whether the plugin participates in hook chains.
    pub enabled: bool,
    /// Lower values run earlier in every chain.
    pub load_order: i32,
    /// Plugin ids that must be loaded before this one.
    pub dependencies: Vec<String>,
}

/// Categories an injected or real processing error can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Memory,
    Format,
    Hardware,
    Authorization,
    Queue,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 6] = [
        Self::Network,
        Self::Memory,
        Self::Format,
        Self::Hardware,
        Self::Authorization,
        Self::Queue,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Memory => "memory",
            Self::Format => "format",
            Self::Hardware => "hardware",
            Self::Authorization => "authorization",
            Self::Queue => "queue",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Outcome of a `before_job_processing` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookVerdict {
    /// Proceed to the next plugin (and ultimately to ingestion).
    Continue,
    /// Refuse the job; the dispatcher answers with a service-unavailable
    /// class status.
    Reject(String),
    /// Fail the job with a categorised error; the dispatcher answers with
    /// the aborted-job shape.
    Error {
        category: ErrorCategory,
        message: String,
    },
}

/// A response override a process hook may request instead of the standard
/// job-attributes answer.
#[derive(Debug, Clone)]
pub struct CustomResponse {
    /// IPP status code wire value.
    pub status: u16,
    pub message: String,
}

/// Result of a `process_job` hook.  The first plugin returning one of
/// these wins the job; later plugins are skipped.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Replacement document bytes; format re-detection runs against these.
    pub processed_bytes: Option<Vec<u8>>,
    /// Replacement job record (rarely used; annotations usually suffice).
    pub modified_job: Option<CapturedJob>,
    /// Annotations merged into the job's metadata map.
    pub custom_metadata: ConfigMap,
    /// False aborts ingestion after this plugin.
    pub should_continue: bool,
    pub custom_response: Option<CustomResponse>,
}

/// Paths and facts handed to `on_load`.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub config_dir: PathBuf,
    pub job_dir: PathBuf,
}

/// A virtual-printer plugin.
///
/// All hooks have no-op defaults so a plugin implements only what it
/// needs.  Hooks receive shared references; implementations use interior
/// mutability for their own state.
#[async_trait]
pub trait PrinterPlugin: Send + Sync {
    /// Identity, ordering, and dependency information.
    fn metadata(&self) -> PluginMetadata;

    /// Called when the plugin is loaded into an active registry.
    async fn on_load(&self, _context: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is unloaded.
    async fn on_unload(&self) -> Result<()> {
        Ok(())
    }

    /// Runs before ingestion; may delay, reject, or fail the job.
    async fn before_job_processing(&self, _job: &CapturedJob) -> HookVerdict {
        HookVerdict::Continue
    }

    /// May transform the document or annotate the job.  Return `None` to
    /// pass; the first non-`None` result wins the chain.
    async fn process_job(
        &self,
        _job: &CapturedJob,
        _document: &[u8],
    ) -> Option<ProcessOutcome> {
        None
    }

    /// Observation-only notification after ingestion finished or failed.
    async fn after_job_processing(&self, _job: &CapturedJob, _success: bool) {}

    /// May replace advertised printer capabilities.  Receives the groups
    /// composed so far; returns replacement groups or `None` to pass.
    async fn customize_ipp_attributes(
        &self,
        _groups: &[AttributeGroup],
    ) -> Option<Vec<AttributeGroup>> {
        None
    }

    /// Claim an operation outside the standard dispatch table.  Return
    /// true when handled.
    async fn handle_custom_operation(
        &self,
        _operation: &str,
        _groups: &[AttributeGroup],
    ) -> bool {
        false
    }

    /// Offer the plugin a look at an error.  Return true when handled.
    async fn handle_error(&self, _error: &papertrap_core::PapertrapError, _context: &str) -> bool {
        false
    }

    /// Declared configuration surface, if any.
    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        None
    }

    /// Apply a validated configuration map.
    async fn update_configuration(&self, _values: ConfigMap) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories_have_stable_keywords() {
        assert_eq!(ErrorCategory::ALL.len(), 6);
        assert_eq!(ErrorCategory::Network.keyword(), "network");
        assert_eq!(ErrorCategory::Queue.to_string(), "queue");
    }

    #[test]
    fn process_outcome_default_is_inert() {
        let outcome = ProcessOutcome::default();
        assert!(outcome.processed_bytes.is_none());
        assert!(outcome.modified_job.is_none());
        assert!(outcome.custom_metadata.is_empty());
        assert!(!outcome.should_continue);
        assert!(outcome.custom_response.is_none());
    }
}
