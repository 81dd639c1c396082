//! Explicit, statically-populated registry of plugins, connection managers,
//! and result collators.
//!
//! The source resolves these by recursively importing a package tree and
//! filtering classes via `isinstance` + `is_valid()`. The static-linking
//! replacement: every plugin crate exposes one `register(&mut PluginRegistry)`
//! function, called once by the CLI at startup for a fixed list of crates.
//! Later registrations under the same name overwrite earlier ones, matching
//! the source's "last discovery wins" behavior.

use std::sync::Arc;

use indexmap::IndexMap;
use nodescraper_api::{OsFamily, Plugin, PluginResultCollator, RegistryError};

use crate::connection::{InBandConnectionManager, InBandTarget};

pub type PluginCtor = fn() -> Box<dyn Plugin>;
pub type CollatorCtor = fn() -> Box<dyn PluginResultCollator>;

/// Static description a plugin crate's `register()` supplies alongside its
/// constructor, so `describe plugin <name>` can report `DATA_MODEL`,
/// `CONNECTION_TYPE`, and declared support sets without building an instance
/// or touching a connection (`spec.md` §8 scenario S8).
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub connection_type: Option<&'static str>,
    pub ctor: PluginCtor,
    pub data_model_name: &'static str,
    pub supported_os_family: &'static [OsFamily],
}

#[derive(Clone, Copy)]
pub struct CollatorDescriptor {
    pub name: &'static str,
    pub ctor: CollatorCtor,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<&'static str, PluginDescriptor>,
    collators: IndexMap<&'static str, CollatorDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a plugin descriptor, rejecting it up front if a constructed
    /// instance fails `is_valid()` (the "at least one of collector/analyzer"
    /// gate from `spec.md` §4.6 / boundary behaviors).
    pub fn register_plugin(&mut self, descriptor: PluginDescriptor) -> Result<(), RegistryError> {
        let probe = (descriptor.ctor)();
        if !probe.is_valid() {
            return Err(RegistryError::Invalid(
                descriptor.name.to_string(),
                "plugin declares neither a collector nor an analyzer".to_string(),
            ));
        }
        self.plugins.insert(descriptor.name, descriptor);
        Ok(())
    }

    pub fn register_collator(&mut self, descriptor: CollatorDescriptor) {
        self.collators.insert(descriptor.name, descriptor);
    }

    pub fn build_plugin(&self, name: &str) -> Result<Box<dyn Plugin>, RegistryError> {
        let descriptor = self
            .plugins
            .get(name)
            .ok_or_else(|| RegistryError::UnknownPlugin(name.to_string()))?;
        Ok((descriptor.ctor)())
    }

    pub fn connection_type_for(&self, plugin_name: &str) -> Option<&'static str> {
        self.plugins.get(plugin_name).and_then(|d| d.connection_type)
    }

    pub fn build_collator(&self, name: &str) -> Result<Box<dyn PluginResultCollator>, RegistryError> {
        let descriptor = self
            .collators
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCollator(name.to_string()))?;
        Ok((descriptor.ctor)())
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.keys().copied()
    }

    pub fn plugin_descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name)
    }

    /// Connection managers are not plugins or collators, but the registry
    /// is also the place that knows how to build the one built-in
    /// connection-manager kind (`InBandConnectionManager`) for a given
    /// target, keyed by the well-known name `"InBandConnectionManager"`.
    pub fn build_connection_manager(
        &self,
        name: &str,
        target: InBandTarget,
        hooks: Arc<Vec<Box<dyn nodescraper_api::TaskResultHook>>>,
    ) -> Result<InBandConnectionManager, RegistryError> {
        match name {
            "InBandConnectionManager" => Ok(InBandConnectionManager::new(target, hooks)),
            other => Err(RegistryError::UnknownConnectionManager(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::{PluginResult, PluginRunContext};

    struct AlwaysValidPlugin;
    impl Plugin for AlwaysValidPlugin {
        fn name(&self) -> &'static str {
            "AlwaysValidPlugin"
        }
        fn is_valid(&self) -> bool {
            true
        }
        fn run(&mut self, _ctx: PluginRunContext<'_>) -> PluginResult {
            PluginResult::not_ran("AlwaysValidPlugin", "noop")
        }
    }

    struct AlwaysInvalidPlugin;
    impl Plugin for AlwaysInvalidPlugin {
        fn name(&self) -> &'static str {
            "AlwaysInvalidPlugin"
        }
        fn is_valid(&self) -> bool {
            false
        }
        fn run(&mut self, _ctx: PluginRunContext<'_>) -> PluginResult {
            PluginResult::not_ran("AlwaysInvalidPlugin", "noop")
        }
    }

    #[test]
    fn invalid_plugin_is_rejected_at_registration() {
        let mut registry = PluginRegistry::new();
        let result = registry.register_plugin(PluginDescriptor {
            name: "AlwaysInvalidPlugin",
            connection_type: None,
            ctor: || Box::new(AlwaysInvalidPlugin),
            data_model_name: "",
            supported_os_family: &[],
        });
        assert!(result.is_err());
        assert!(registry.build_plugin("AlwaysInvalidPlugin").is_err());
    }

    #[test]
    fn valid_plugin_is_retrievable_by_name() {
        let mut registry = PluginRegistry::new();
        registry
            .register_plugin(PluginDescriptor {
                name: "AlwaysValidPlugin",
                connection_type: None,
                ctor: || Box::new(AlwaysValidPlugin),
                data_model_name: "",
                supported_os_family: &[],
            })
            .unwrap();
        assert!(registry.build_plugin("AlwaysValidPlugin").is_ok());
    }

    #[test]
    fn unknown_plugin_lookup_is_a_soft_error() {
        let registry = PluginRegistry::new();
        assert!(matches!(registry.build_plugin("Nope"), Err(RegistryError::UnknownPlugin(_))));
    }
}
