//! Static registration: the fixed list of plugin crates this binary links
//! against, called once at startup in place of the reference
//! implementation's recursive module-tree import.

use nodescraper_core::{CollatorDescriptor, PluginRegistry, TableSummaryCollator};

pub fn build_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    nodescraper_plugin_kernel::register(&mut registry);
    nodescraper_plugin_cmdline::register(&mut registry);
    nodescraper_plugin_dmesg::register(&mut registry);

    registry.register_collator(CollatorDescriptor {
        name: "TableSummaryCollator",
        ctor: || Box::new(TableSummaryCollator::new()),
    });

    registry
}
