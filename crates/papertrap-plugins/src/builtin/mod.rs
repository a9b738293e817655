// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in plugins.  All ship disabled; the host loads the ones it wants.

pub mod attribute_override;
pub mod delay;
pub mod error_injector;
pub mod logging;
pub mod modifier;

use std::sync::Arc;

use crate::api::PrinterPlugin;

pub use attribute_override::AttributeOverridePlugin;
pub use delay::DelaySimulatorPlugin;
pub use error_injector::ErrorInjectorPlugin;
pub use logging::LoggingEnhancerPlugin;
pub use modifier::DocumentModifierPlugin;

/// Fresh instances of every built-in plugin, in load order.
pub fn builtin_plugins() -> Vec<Arc<dyn PrinterPlugin>> {
    vec![
        Arc::new(DelaySimulatorPlugin::new()),
        Arc::new(ErrorInjectorPlugin::new()),
        Arc::new(DocumentModifierPlugin::new()),
        Arc::new(AttributeOverridePlugin::new()),
        Arc::new(LoggingEnhancerPlugin::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_unique_ids_and_ascending_load_order() {
        let plugins = builtin_plugins();
        assert_eq!(plugins.len(), 5);

        let metadata: Vec<_> = plugins.iter().map(|p| p.metadata()).collect();
        for window in metadata.windows(2) {
            assert!(window[0].load_order < window[1].load_order);
        }

        let mut ids: Vec<String> = metadata.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn builtins_ship_disabled() {
        for plugin in builtin_plugins() {
            assert!(!plugin.metadata().enabled, "{} ships enabled", plugin.metadata().id);
        }
    }
}
