//! Plugin Registry - Catalog of passes and resolution of the configured list

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::external::ExternalPlugin;
use super::{builtin, Params, Plugin, PluginError};
use crate::config::{PipelineConfig, PluginSpec};
use crate::document::Document;
use crate::hashing::canonical_json;

/// A plugin as found in the registry, before any configuration is merged.
///
/// Lookups hand out fresh copies: editing a definition's params never
/// touches the registry.
#[derive(Clone)]
pub struct PluginDefinition {
    pub canonical_name: String,
    pub params: Option<Params>,
    pub plugin: Arc<dyn Plugin>,
    pub active: bool,
}

impl PluginDefinition {
    pub fn from_plugin(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            canonical_name: plugin.name().to_string(),
            params: plugin.default_params(),
            plugin,
            active: false,
        }
    }
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("canonical_name", &self.canonical_name)
            .field("params", &self.params)
            .field("active", &self.active)
            .finish()
    }
}

/// A definition merged with its effective parameters for one run.
#[derive(Clone)]
pub struct ResolvedPlugin {
    /// Name or path the plugin was configured under.
    pub plugin_name: String,
    pub canonical_name: String,
    pub params: Option<Params>,
    pub active: bool,
    plugin: Arc<dyn Plugin>,
}

impl ResolvedPlugin {
    pub fn new(definition: PluginDefinition, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            canonical_name: definition.canonical_name,
            params: definition.params,
            active: definition.active,
            plugin: definition.plugin,
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params
            .get_or_insert_with(Params::new)
            .insert(name.into(), value.into());
    }

    pub fn apply(&self, doc: &mut Document) -> Result<(), PluginError> {
        match &self.params {
            Some(params) => self.plugin.apply(doc, params),
            None => self.plugin.apply(doc, &Params::new()),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "pluginName": self.plugin_name,
            "name": self.canonical_name,
            "active": self.active,
            "params": self.params,
        })
    }
}

impl fmt::Debug for ResolvedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPlugin")
            .field("plugin_name", &self.plugin_name)
            .field("canonical_name", &self.canonical_name)
            .field("params", &self.params)
            .field("active", &self.active)
            .finish()
    }
}

/// Plugin registry - built-in passes plus anything registered at runtime
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in builtin::all() {
            registry.register(plugin);
        }
        registry
    }

    /// Add a plugin, replacing any plugin with the same name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// All plugins, sorted by name.
    pub fn list(&self) -> Vec<&Arc<dyn Plugin>> {
        let mut plugins: Vec<_> = self.plugins.values().collect();
        plugins.sort_by(|a, b| a.name().cmp(b.name()));
        plugins
    }

    pub fn lookup_name(&self, name: &str) -> Option<PluginDefinition> {
        self.plugins
            .get(name)
            .map(|plugin| PluginDefinition::from_plugin(Arc::clone(plugin)))
    }

    /// Find the definition a spec refers to. External plugin paths are
    /// resolved against `plugins_dir`; load failures are logged and reported
    /// as not found.
    pub fn lookup(
        &self,
        spec: &PluginSpec,
        plugins_dir: Option<&Path>,
    ) -> Option<PluginDefinition> {
        if let Some(path) = &spec.path {
            let full_path = match plugins_dir {
                Some(dir) => dir.join(path),
                None => Path::new(path).to_path_buf(),
            };
            return match ExternalPlugin::load(&full_path) {
                Ok(plugin) => Some(PluginDefinition::from_plugin(Arc::new(plugin))),
                Err(e) => {
                    error!(
                        path = %full_path.display(),
                        error = %e,
                        "failed to load external plugin"
                    );
                    None
                }
            };
        }
        spec.name.as_deref().and_then(|name| self.lookup_name(name))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Turn the configured plugin list into the ordered list of active plugins.
///
/// Disabled and unknown specs are skipped. A global `floatPrecision` is only
/// written to plugins that declare that parameter, then the entry's own params
/// are merged over the defaults.
pub fn resolve_plugins(registry: &PluginRegistry, config: &PipelineConfig) -> Vec<ResolvedPlugin> {
    let mut resolved = Vec::with_capacity(config.plugins.len());

    for spec in &config.plugins {
        if !spec.enabled {
            continue;
        }

        let Some(mut definition) = registry.lookup(spec, config.plugins_dir.as_deref()) else {
            warn!(plugin = spec.label(), "Plugin not found");
            continue;
        };
        debug!(plugin = spec.label(), "Enabled plugin");

        definition.active = true;

        if let Some(params) = definition.params.as_mut() {
            if let Some(precision) = config.float_precision {
                if params.contains_key("floatPrecision") {
                    params.insert("floatPrecision".to_string(), Value::from(precision));
                }
            }
            debug!(plugin = spec.label(), params = %render_params(params), "default params");
        }

        if let Some(overrides) = &spec.params {
            let params = definition.params.get_or_insert_with(Params::new);
            for (key, value) in overrides {
                params.insert(key.clone(), value.clone());
            }
            debug!(plugin = spec.label(), params = %render_params(params), "resulting params");
        }

        resolved.push(ResolvedPlugin::new(definition, spec.label()));
    }

    resolved
}

fn render_params(params: &Params) -> String {
    canonical_json(params).unwrap_or_default()
}
