// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document modifier — stamps a diagonal translucent watermark onto PDF,
// JPEG, and PNG documents as they pass through the capture pipeline.

use std::sync::Mutex;

use async_trait::async_trait;
use papertrap_core::error::Result;
use papertrap_core::types::{CapturedJob, DocumentType};
use papertrap_document::sniff::detect_type;
use papertrap_document::watermark::{self, WatermarkSpec};
use serde_json::json;
use tracing::{debug, warn};

use crate::api::{ConfigMap, PluginMetadata, PrinterPlugin, ProcessOutcome};
use crate::schema::{ConfigField, ConfigurationSchema, FieldType};

#[derive(Debug, Clone)]
struct ModifierConfig {
    enabled: bool,
    text: String,
    opacity: f32,
    size: f32,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "CAPTURED BY PAPERTRAP".into(),
            opacity: 0.3,
            size: 48.0,
        }
    }
}

/// Watermarks supported documents in `process_job`.
pub struct DocumentModifierPlugin {
    config: Mutex<ModifierConfig>,
}

impl DocumentModifierPlugin {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(ModifierConfig::default()),
        }
    }
}

impl Default for DocumentModifierPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrinterPlugin for DocumentModifierPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            id: "document-modifier".into(),
            name: "Document Modifier".into(),
            version: "1.0.0".into(),
            description: "Overlays a diagonal translucent watermark on captured documents".into(),
            author: "papertrap".into(),
            enabled: false,
            load_order: 30,
            dependencies: Vec::new(),
        }
    }

    async fn process_job(&self, job: &CapturedJob, document: &[u8]) -> Option<ProcessOutcome> {
        let config = self.config.lock().expect("modifier config lock").clone();
        if !config.enabled || document.is_empty() {
            return None;
        }

        let detected = detect_type(document);
        if !matches!(
            detected,
            DocumentType::Pdf | DocumentType::Jpeg | DocumentType::Png
        ) {
            debug!(job_id = %job.id, ?detected, "document modifier skipping unsupported type");
            return None;
        }

        let spec = WatermarkSpec {
            text: config.text.clone(),
            opacity: config.opacity,
            size: config.size,
        };

        match watermark::apply(document, detected, &spec) {
            Ok(bytes) => {
                let mut metadata = ConfigMap::new();
                metadata.insert("watermarked".into(), json!(true));
                metadata.insert("watermark-text".into(), json!(config.text));
                Some(ProcessOutcome {
                    processed_bytes: Some(bytes),
                    modified_job: None,
                    custom_metadata: metadata,
                    should_continue: true,
                    custom_response: None,
                })
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "watermarking failed; leaving document untouched");
                None
            }
        }
    }

    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        Some(ConfigurationSchema::new(vec![
            ConfigField::new("enabled", "Enabled", FieldType::Boolean).default_value(json!(true)),
            ConfigField::new("watermarkText", "Watermark text", FieldType::Text)
                .default_value(json!("CAPTURED BY PAPERTRAP")),
            ConfigField::new("opacity", "Opacity", FieldType::Number)
                .default_value(json!(0.3))
                .range(0.1, 1.0),
            ConfigField::new("fontSize", "Font size", FieldType::Number)
                .default_value(json!(48))
                .range(12.0, 144.0),
        ]))
    }

    async fn update_configuration(&self, values: ConfigMap) -> Result<()> {
        let mut config = self.config.lock().expect("modifier config lock");
        if let Some(enabled) = values.get("enabled").and_then(|v| v.as_bool()) {
            config.enabled = enabled;
        }
        if let Some(text) = values.get("watermarkText").and_then(|v| v.as_str()) {
            config.text = text.to_string();
        }
        if let Some(opacity) = values.get("opacity").and_then(|v| v.as_f64()) {
            config.opacity = opacity as f32;
        }
        if let Some(size) = values.get("fontSize").and_then(|v| v.as_f64()) {
            config.size = size as f32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertrap_core::types::JobId;
    use papertrap_document::pdf::wrap_in_pdf;

    fn job() -> CapturedJob {
        CapturedJob::new(JobId(9), "j".into(), "application/pdf".into(), "u".into())
    }

    #[tokio::test]
    async fn watermarks_pdf_documents() {
        let plugin = DocumentModifierPlugin::new();
        let pdf = wrap_in_pdf(b"q Q").unwrap();

        let outcome = plugin.process_job(&job(), &pdf).await.expect("outcome");
        let bytes = outcome.processed_bytes.expect("replacement bytes");
        assert!(bytes.starts_with(b"%PDF"));
        assert_ne!(bytes, pdf);
        assert!(outcome.should_continue);
        assert_eq!(outcome.custom_metadata.get("watermarked"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn passes_on_plain_text() {
        let plugin = DocumentModifierPlugin::new();
        let outcome = plugin.process_job(&job(), b"just words\n").await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn disabled_plugin_passes() {
        let plugin = DocumentModifierPlugin::new();
        let mut values = ConfigMap::new();
        values.insert("enabled".into(), json!(false));
        plugin.update_configuration(values).await.unwrap();

        let pdf = wrap_in_pdf(b"q Q").unwrap();
        assert!(plugin.process_job(&job(), &pdf).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_pdf_is_left_untouched() {
        let plugin = DocumentModifierPlugin::new();
        // Signature says PDF, structure says otherwise.
        let outcome = plugin.process_job(&job(), b"%PDF-1.4 not really").await;
        assert!(outcome.is_none());
    }
}
