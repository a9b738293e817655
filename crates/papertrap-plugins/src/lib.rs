// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// papertrap-plugins — Plugin contract, configuration schemas, registry
// with ordered hook chains, and the built-in plugin set.

pub mod api;
pub mod builtin;
pub mod registry;
pub mod schema;

pub use api::{
    ConfigMap, CustomResponse, ErrorCategory, HookVerdict, PluginContext, PluginMetadata,
    PrinterPlugin, ProcessOutcome,
};
pub use registry::PluginRegistry;
pub use schema::{ConfigField, ConfigurationSchema, FieldType};
