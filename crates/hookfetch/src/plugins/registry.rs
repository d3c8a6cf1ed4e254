//! Plugin registry holding the ordered plugin list
//!
//! The registry is filled while a client is being built and is read-only
//! afterwards. Registration order is execution order for every phase.

use std::sync::Arc;
use tracing::{debug, info};

use crate::plugins::core::{Phase, Plugin};

/// Ordered list of installed plugins
///
/// # Examples
///
/// ```rust,no_run
/// use hookfetch::plugins::{HookRegistry, Phase, RetryPlugin, RetryConfig};
/// use std::sync::Arc;
///
/// let mut registry = HookRegistry::new();
/// registry.register(Arc::new(RetryPlugin::new(RetryConfig::default())));
///
/// for plugin in registry.for_phase(Phase::Fetch) {
///     println!("{} binds the fetch function", plugin.name());
/// }
/// ```
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Registered plugins in execution order
    plugins: Vec<Arc<dyn Plugin>>,
}

impl HookRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Append a plugin
    ///
    /// Duplicate names are allowed; each registration runs independently.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        info!(
            "Registering plugin: {} v{} (phases: {:?})",
            plugin.name(),
            plugin.version(),
            plugin.phases()
        );
        let index = self.plugins.len();
        self.plugins.push(plugin);
        debug!("Plugin registered at index {}", index);
    }

    /// Plugins with a hook for `phase`, in registration order
    ///
    /// The sequence is lazy and `Clone`; cloning it, or calling this again,
    /// restarts from the first plugin.
    pub fn for_phase(&self, phase: Phase) -> PhaseHooks<'_> {
        PhaseHooks {
            plugins: self.plugins.iter(),
            phase,
        }
    }

    /// All plugins in registration order
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> + Clone {
        self.plugins.iter()
    }

    /// First plugin registered under `name`
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// Whether any plugin is registered under `name`
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Registered plugin names in execution order
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Number of registered plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Get plugin information for debugging
    pub fn plugin_info(&self) -> Vec<(String, String, Option<String>)> {
        self.plugins
            .iter()
            .map(|plugin| {
                (
                    plugin.name().to_string(),
                    plugin.version().to_string(),
                    plugin.description().map(str::to_string),
                )
            })
            .collect()
    }
}

/// Lazy sequence of the plugins handling one phase
#[derive(Clone)]
pub struct PhaseHooks<'a> {
    plugins: std::slice::Iter<'a, Arc<dyn Plugin>>,
    phase: Phase,
}

impl<'a> Iterator for PhaseHooks<'a> {
    type Item = &'a Arc<dyn Plugin>;

    fn next(&mut self) -> Option<Self::Item> {
        let phase = self.phase;
        self.plugins.find(|plugin| plugin.handles(phase))
    }
}
