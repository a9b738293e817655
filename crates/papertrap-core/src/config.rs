// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration and persisted preferences.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default TCP port for the capture server.  Non-privileged on purpose —
/// 631 requires elevated rights on most hosts.
pub const DEFAULT_PORT: u16 = 8631;

/// Runtime configuration for the virtual printer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port the IPP/HTTP listener binds to.
    pub port: u16,
    /// Name advertised via DNS-SD and reported as `printer-name`.
    pub printer_name: String,
    /// Directory receiving captured job artifacts.
    pub job_dir: PathBuf,
    /// Directory holding `plugin_config.json` and `ipp_attributes/`.
    pub config_dir: PathBuf,
    /// Whether to register the service over DNS-SD on start.
    pub advertise: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            printer_name: "Papertrap Virtual Printer".into(),
            job_dir: PathBuf::from("jobs"),
            config_dir: PathBuf::from("config"),
            advertise: true,
        }
    }
}

/// User preferences persisted as JSON in the configuration directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Overrides the configured printer name when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    /// Path of the attribute-override document to apply on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_attributes_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_unprivileged() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8631);
        assert!(config.port > 1024);
    }

    #[test]
    fn preferences_roundtrip() {
        let prefs = Preferences {
            printer_name: Some("Lab-A".into()),
            selected_attributes_file: None,
        };
        let json = serde_json::to_string(&prefs).unwrap();
        let back: Preferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back.printer_name.as_deref(), Some("Lab-A"));
        assert!(back.selected_attributes_file.is_none());
    }

    #[test]
    fn preferences_tolerate_missing_keys() {
        let back: Preferences = serde_json::from_str("{}").unwrap();
        assert!(back.printer_name.is_none());
    }
}
