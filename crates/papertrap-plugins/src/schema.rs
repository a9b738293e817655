// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plugin configuration schemas.
//
// A schema is an ordered list of fields a host UI can render and the
// registry can validate submitted values against before handing them to
// the plugin.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use papertrap_core::error::{PapertrapError, Result};

/// Field types a configuration form can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Select,
    File,
    Color,
}

/// One configuration field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Json>,
    #[serde(default)]
    pub required: bool,
    /// Valid choices for [`FieldType::Select`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            default_value: None,
            required: false,
            options: None,
            min: None,
            max: None,
            description: None,
        }
    }

    pub fn default_value(mut self, value: Json) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Ordered schema of a plugin's configuration surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationSchema {
    pub fields: Vec<ConfigField>,
}

impl ConfigurationSchema {
    pub fn new(fields: Vec<ConfigField>) -> Self {
        Self { fields }
    }

    /// Validate a submitted value map against this schema.
    ///
    /// Unknown keys are rejected; required keys must be present; numbers
    /// must sit inside a declared range; select values must be one of the
    /// declared options.
    pub fn validate(&self, values: &crate::api::ConfigMap) -> Result<()> {
        for key in values.keys() {
            if !self.fields.iter().any(|f| &f.key == key) {
                return Err(PapertrapError::PluginConfig(format!(
                    "unknown configuration key: {key}"
                )));
            }
        }

        for field in &self.fields {
            let Some(value) = values.get(&field.key) else {
                if field.required && field.default_value.is_none() {
                    return Err(PapertrapError::PluginConfig(format!(
                        "missing required key: {}",
                        field.key
                    )));
                }
                continue;
            };

            match field.field_type {
                FieldType::Boolean => {
                    if !value.is_boolean() {
                        return Err(PapertrapError::PluginConfig(format!(
                            "{} must be a boolean",
                            field.key
                        )));
                    }
                }
                FieldType::Number => {
                    let Some(number) = value.as_f64() else {
                        return Err(PapertrapError::PluginConfig(format!(
                            "{} must be a number",
                            field.key
                        )));
                    };
                    if let Some(min) = field.min {
                        if number < min {
                            return Err(PapertrapError::PluginConfig(format!(
                                "{} must be >= {min}",
                                field.key
                            )));
                        }
                    }
                    if let Some(max) = field.max {
                        if number > max {
                            return Err(PapertrapError::PluginConfig(format!(
                                "{} must be <= {max}",
                                field.key
                            )));
                        }
                    }
                }
                FieldType::Select => {
                    let valid = value
                        .as_str()
                        .map(|s| {
                            field
                                .options
                                .as_ref()
                                .map(|opts| opts.iter().any(|o| o == s))
                                .unwrap_or(true)
                        })
                        .unwrap_or(false);
                    if !valid {
                        return Err(PapertrapError::PluginConfig(format!(
                            "{} must be one of the declared options",
                            field.key
                        )));
                    }
                }
                FieldType::Text | FieldType::File | FieldType::Color => {
                    if !value.is_string() {
                        return Err(PapertrapError::PluginConfig(format!(
                            "{} must be a string",
                            field.key
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
