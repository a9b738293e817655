// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attribute override — replaces advertised printer identity and
// capabilities with configured values, letting the virtual printer pose
// as a specific device model.

use std::sync::Mutex;

use async_trait::async_trait;
use papertrap_core::error::Result;
use papertrap_ipp::model::{Attribute, AttributeGroup, DelimiterTag, IppValue};
use serde_json::json;

use crate::api::{ConfigMap, PluginMetadata, PrinterPlugin};
use crate::schema::{ConfigField, ConfigurationSchema, FieldType};

#[derive(Debug, Clone, Default)]
struct OverrideConfig {
    printer_name: Option<String>,
    location: Option<String>,
    info: Option<String>,
    make_and_model: Option<String>,
    color_supported: Option<bool>,
    duplex_supported: Option<bool>,
    accepting_jobs: Option<bool>,
    queued_job_count: Option<i32>,
    /// Comma-separated media keywords.
    media: Option<Vec<String>>,
    copies_max: Option<i32>,
}

impl OverrideConfig {
    fn is_empty(&self) -> bool {
        self.printer_name.is_none()
            && self.location.is_none()
            && self.info.is_none()
            && self.make_and_model.is_none()
            && self.color_supported.is_none()
            && self.duplex_supported.is_none()
            && self.accepting_jobs.is_none()
            && self.queued_job_count.is_none()
            && self.media.is_none()
            && self.copies_max.is_none()
    }
}

/// Emits a replacement printer-attributes group from its configuration.
pub struct AttributeOverridePlugin {
    config: Mutex<OverrideConfig>,
}

impl AttributeOverridePlugin {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(OverrideConfig::default()),
        }
    }

    fn build_group(config: &OverrideConfig) -> AttributeGroup {
        let mut group = AttributeGroup::new(DelimiterTag::PrinterAttributes);

        if let Some(name) = &config.printer_name {
            group.set(Attribute::new("printer-name", IppValue::Name(name.clone())));
        }
        if let Some(location) = &config.location {
            group.set(Attribute::new(
                "printer-location",
                IppValue::Text(location.clone()),
            ));
        }
        if let Some(info) = &config.info {
            group.set(Attribute::new("printer-info", IppValue::Text(info.clone())));
        }
        if let Some(model) = &config.make_and_model {
            group.set(Attribute::new(
                "printer-make-and-model",
                IppValue::Text(model.clone()),
            ));
        }
        if let Some(color) = config.color_supported {
            group.set(Attribute::new("color-supported", IppValue::Boolean(color)));
        }
        if let Some(duplex) = config.duplex_supported {
            let sides: Vec<IppValue> = if duplex {
                vec![
                    IppValue::Keyword("one-sided".into()),
                    IppValue::Keyword("two-sided-long-edge".into()),
                    IppValue::Keyword("two-sided-short-edge".into()),
                ]
            } else {
                vec![IppValue::Keyword("one-sided".into())]
            };
            group.set(Attribute::with_values("sides-supported", sides));
            group.set(Attribute::new(
                "sides-default",
                IppValue::Keyword("one-sided".into()),
            ));
        }
        if let Some(accepting) = config.accepting_jobs {
            group.set(Attribute::new(
                "printer-is-accepting-jobs",
                IppValue::Boolean(accepting),
            ));
        }
        if let Some(count) = config.queued_job_count {
            group.set(Attribute::new(
                "queued-job-count",
                IppValue::Integer(count),
            ));
        }
        if let Some(media) = &config.media {
            group.set(Attribute::with_values(
                "media-supported",
                media
                    .iter()
                    .map(|m| IppValue::Keyword(m.clone()))
                    .collect(),
            ));
            if let Some(first) = media.first() {
                group.set(Attribute::new(
                    "media-default",
                    IppValue::Keyword(first.clone()),
                ));
            }
        }
        if let Some(max) = config.copies_max {
            group.set(Attribute::new(
                "copies-supported",
                IppValue::RangeOfInteger { low: 1, high: max },
            ));
        }

        // Fixed capability surface for the posed device.
        group.set(Attribute::with_values(
            "print-quality-supported",
            vec![IppValue::Enum(3), IppValue::Enum(4), IppValue::Enum(5)],
        ));
        group.set(Attribute::new("print-quality-default", IppValue::Enum(4)));
        group.set(Attribute::with_values(
            "orientation-requested-supported",
            vec![
                IppValue::Enum(3),
                IppValue::Enum(4),
                IppValue::Enum(5),
                IppValue::Enum(6),
            ],
        ));
        group.set(Attribute::with_values(
            "number-up-supported",
            vec![
                IppValue::Integer(1),
                IppValue::Integer(2),
                IppValue::Integer(4),
            ],
        ));
        group.set(Attribute::new("number-up-default", IppValue::Integer(1)));

        group
    }
}

impl Default for AttributeOverridePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrinterPlugin for AttributeOverridePlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            id: "attribute-override".into(),
            name: "Attribute Override".into(),
            version: "1.0.0".into(),
            description: "Overrides advertised printer identity and capabilities".into(),
            author: "papertrap".into(),
            enabled: false,
            load_order: 40,
            dependencies: Vec::new(),
        }
    }

    async fn customize_ipp_attributes(
        &self,
        _groups: &[AttributeGroup],
    ) -> Option<Vec<AttributeGroup>> {
        let config = self.config.lock().expect("override config lock").clone();
        if config.is_empty() {
            return None;
        }
        Some(vec![Self::build_group(&config)])
    }

    fn configuration_schema(&self) -> Option<ConfigurationSchema> {
        Some(ConfigurationSchema::new(vec![
            ConfigField::new("printerName", "Printer name", FieldType::Text),
            ConfigField::new("location", "Location", FieldType::Text),
            ConfigField::new("info", "Info string", FieldType::Text),
            ConfigField::new("makeAndModel", "Make and model", FieldType::Text),
            ConfigField::new("colorSupported", "Colour supported", FieldType::Boolean),
            ConfigField::new("duplexSupported", "Duplex supported", FieldType::Boolean),
            ConfigField::new("acceptingJobs", "Accepting jobs", FieldType::Boolean),
            ConfigField::new("queuedJobCount", "Queued job count", FieldType::Number)
                .range(0.0, 999.0),
            ConfigField::new("media", "Media keywords (comma-separated)", FieldType::Text),
            ConfigField::new("copiesMax", "Maximum copies", FieldType::Number)
                .range(1.0, 999.0)
                .default_value(json!(99)),
        ]))
    }

    async fn update_configuration(&self, values: ConfigMap) -> Result<()> {
        let mut config = self.config.lock().expect("override config lock");
        let get_str =
            |key: &str| values.get(key).and_then(|v| v.as_str()).map(str::to_string);

        if let Some(name) = get_str("printerName") {
            config.printer_name = Some(name);
        }
        if let Some(location) = get_str("location") {
            config.location = Some(location);
        }
        if let Some(info) = get_str("info") {
            config.info = Some(info);
        }
        if let Some(model) = get_str("makeAndModel") {
            config.make_and_model = Some(model);
        }
        if let Some(color) = values.get("colorSupported").and_then(|v| v.as_bool()) {
            config.color_supported = Some(color);
        }
        if let Some(duplex) = values.get("duplexSupported").and_then(|v| v.as_bool()) {
            config.duplex_supported = Some(duplex);
        }
        if let Some(accepting) = values.get("acceptingJobs").and_then(|v| v.as_bool()) {
            config.accepting_jobs = Some(accepting);
        }
        if let Some(count) = values.get("queuedJobCount").and_then(|v| v.as_i64()) {
            config.queued_job_count = Some(count as i32);
        }
        if let Some(media) = get_str("media") {
            let list: Vec<String> = media
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            config.media = (!list.is_empty()).then_some(list);
        }
        if let Some(max) = values.get("copiesMax").and_then(|v| v.as_i64()) {
            config.copies_max = Some(max as i32);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_plugin_passes() {
        let plugin = AttributeOverridePlugin::new();
        assert!(plugin.customize_ipp_attributes(&[]).await.is_none());
    }

    #[tokio::test]
    async fn duplex_expands_to_sides_keywords() {
        let plugin = AttributeOverridePlugin::new();
        let mut values = ConfigMap::new();
        values.insert("printerName".into(), json!("Lab-A"));
        values.insert("duplexSupported".into(), json!(true));
        plugin.update_configuration(values).await.unwrap();

        let groups = plugin.customize_ipp_attributes(&[]).await.expect("groups");
        assert_eq!(groups.len(), 1);
        let group = &groups[0];

        assert_eq!(group.get_str("printer-name"), Some("Lab-A"));
        assert_eq!(
            group.get_strings("sides-supported"),
            vec!["one-sided", "two-sided-long-edge", "two-sided-short-edge"]
        );
        assert_eq!(group.get_str("sides-default"), Some("one-sided"));
    }

    #[tokio::test]
    async fn simplex_advertises_single_keyword() {
        let plugin = AttributeOverridePlugin::new();
        let mut values = ConfigMap::new();
        values.insert("duplexSupported".into(), json!(false));
        plugin.update_configuration(values).await.unwrap();

        let groups = plugin.customize_ipp_attributes(&[]).await.expect("groups");
        assert_eq!(groups[0].get_strings("sides-supported"), vec!["one-sided"]);
    }

    #[tokio::test]
    async fn media_list_parsed_from_comma_separated_text() {
        let plugin = AttributeOverridePlugin::new();
        let mut values = ConfigMap::new();
        values.insert(
            "media".into(),
            json!("iso_a4_210x297mm, na_letter_8.5x11in"),
        );
        values.insert("copiesMax".into(), json!(10));
        plugin.update_configuration(values).await.unwrap();

        let groups = plugin.customize_ipp_attributes(&[]).await.expect("groups");
        let group = &groups[0];
        assert_eq!(
            group.get_strings("media-supported"),
            vec!["iso_a4_210x297mm", "na_letter_8.5x11in"]
        );
        assert_eq!(group.get_str("media-default"), Some("iso_a4_210x297mm"));
        assert_eq!(
            group.get("copies-supported").unwrap().first(),
            Some(&IppValue::RangeOfInteger { low: 1, high: 10 })
        );
    }
}
