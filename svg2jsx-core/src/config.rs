//! Pipeline Configuration - svgo.json loading and normalization
//!
//! Every field of the on-disk configuration is optional. [`resolve`] fills in
//! the defaults and coerces loosely-typed values; it never fails; values it
//! cannot use are logged and dropped.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::document::SerializeOptions;
use crate::plugins::Params;

pub const DEFAULT_INDENT: usize = 2;
pub const DEFAULT_MAX_PASSES: usize = 10;
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "index";
pub const DEFAULT_COMPONENT_EXTENSION: &str = "jsx";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration exactly as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub enabled: Option<bool>,
    pub full: Option<bool>,
    /// Number or numeric string.
    pub float_precision: Option<Value>,
    #[serde(alias = "pretty")]
    pub pretty_output: Option<bool>,
    pub indent: Option<usize>,
    pub multipass: Option<bool>,
    pub max_passes: Option<usize>,
    pub plugins: Option<Vec<PluginSpec>>,
    pub debug: Option<bool>,
    pub file_timeout_ms: Option<u64>,
    pub plugins_dir: Option<PathBuf>,
    pub output_file_name: Option<String>,
    pub component_extension: Option<String>,
}

/// One entry of the `plugins` list.
///
/// A spec names a built-in pass, or points at an external plugin file. When
/// both are present the file is loaded and the name is only a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

fn default_true() -> bool {
    true
}

impl PluginSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: None,
            enabled: true,
            params: None,
        }
    }

    pub fn external(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
            enabled: true,
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params = Some(map);
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Human-readable identifier for log lines.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Normalized configuration for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub enabled: bool,
    pub full: bool,
    pub float_precision: Option<u32>,
    pub pretty_output: bool,
    pub indent: usize,
    pub multipass: bool,
    pub max_passes: usize,
    pub plugins: Vec<PluginSpec>,
    pub debug: bool,
    pub file_timeout_ms: Option<u64>,
    pub plugins_dir: Option<PathBuf>,
    pub output_file_name: String,
    pub component_extension: String,
}

/// Apply defaults to a raw configuration.
pub fn resolve(raw: RawConfig) -> PipelineConfig {
    let float_precision = raw.float_precision.as_ref().and_then(coerce_precision);

    let max_passes = match raw.max_passes {
        Some(0) => {
            warn!("maxPasses must be at least 1, using 1");
            1
        }
        Some(n) => n,
        None => DEFAULT_MAX_PASSES,
    };

    PipelineConfig {
        enabled: raw.enabled.unwrap_or(true),
        full: raw.full.unwrap_or(true),
        float_precision,
        pretty_output: raw.pretty_output.unwrap_or(true),
        indent: raw.indent.unwrap_or(DEFAULT_INDENT),
        multipass: raw.multipass.unwrap_or(true),
        max_passes,
        plugins: raw.plugins.unwrap_or_default(),
        debug: raw.debug.unwrap_or(false),
        file_timeout_ms: raw.file_timeout_ms,
        plugins_dir: raw.plugins_dir,
        output_file_name: raw
            .output_file_name
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILE_NAME.to_string()),
        component_extension: raw
            .component_extension
            .unwrap_or_else(|| DEFAULT_COMPONENT_EXTENSION.to_string()),
    }
}

fn coerce_precision(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Some(n as u32),
        _ => {
            warn!(value = %value, "ignoring floatPrecision: expected a non-negative integer");
            None
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. A missing file yields [`PipelineConfig::default`].
    ///
    /// A relative `pluginsDir` is resolved against the config file's
    /// directory, which is also the default plugins directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path.parent().map(Path::to_path_buf);

        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let raw: RawConfig =
                serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            resolve(raw)
        } else {
            Self::default()
        };

        config.plugins_dir = match (config.plugins_dir.take(), base_dir) {
            (Some(dir), Some(base)) if dir.is_relative() => Some(base.join(dir)),
            (Some(dir), _) => Some(dir),
            (None, base) => base,
        };

        if config.plugins.is_empty() {
            warn!(path = %path.display(), "no plugins configured");
        }
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(resolve(serde_json::from_str(text)?))
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            pretty: self.pretty_output,
            indent: self.indent,
        }
    }

    pub fn file_timeout(&self) -> Option<Duration> {
        self.file_timeout_ms.map(Duration::from_millis)
    }

    /// File name of the per-directory component module, e.g. `index.jsx`.
    pub fn module_file_name(&self) -> String {
        format!("{}.{}", self.output_file_name, self.component_extension)
    }

    /// The plugin list used when no config file exists.
    pub fn default_plugins() -> Vec<PluginSpec> {
        vec![
            PluginSpec::named("removeDoctype"),
            PluginSpec::named("removeXMLProcInst"),
            PluginSpec::named("removeComments"),
            PluginSpec::named("removeMetadata"),
            PluginSpec::named("removeEditorsNSData"),
            PluginSpec::named("cleanupAttrs"),
            PluginSpec::named("removeTitle"),
            PluginSpec::named("removeDesc"),
            PluginSpec::named("removeUselessDefs"),
            PluginSpec::named("removeEmptyAttrs"),
            PluginSpec::named("cleanupNumericValues"),
            PluginSpec::named("convertColors"),
            PluginSpec::named("convertPathData"),
            PluginSpec::named("cleanupIDs"),
            PluginSpec::named("collapseGroups"),
            PluginSpec::named("removeEmptyContainers"),
            PluginSpec::named("removeDimensions").disabled(),
            PluginSpec::named("removeAttrs")
                .with_params(json!({ "attrs": [] }))
                .disabled(),
            PluginSpec::named("sortAttrs").disabled(),
        ]
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        resolve(RawConfig {
            plugins: Some(Self::default_plugins()),
            ..RawConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert!(config.enabled);
        assert!(config.full);
        assert!(config.multipass);
        assert!(config.pretty_output);
        assert_eq!(config.indent, 2);
        assert_eq!(config.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(config.float_precision, None);
        assert!(config.plugins.is_empty());
        assert_eq!(config.module_file_name(), "index.jsx");
    }

    #[test]
    fn test_float_precision_coercion() {
        let from_number = PipelineConfig::from_json(r#"{"floatPrecision": 2}"#).unwrap();
        assert_eq!(from_number.float_precision, Some(2));

        let from_string = PipelineConfig::from_json(r#"{"floatPrecision": "4"}"#).unwrap();
        assert_eq!(from_string.float_precision, Some(4));

        let invalid = PipelineConfig::from_json(r#"{"floatPrecision": "lots"}"#).unwrap();
        assert_eq!(invalid.float_precision, None);

        let negative = PipelineConfig::from_json(r#"{"floatPrecision": -1}"#).unwrap();
        assert_eq!(negative.float_precision, None);
    }

    #[test]
    fn test_pretty_alias_and_plugin_specs() {
        let config = PipelineConfig::from_json(
            r#"{
                "pretty": false,
                "indent": 4,
                "plugins": [
                    {"name": "removeComments"},
                    {"name": "cleanupIDs", "enabled": false, "params": {"prefix": "x-"}},
                    {"path": "custom/strip.json"}
                ]
            }"#,
        )
        .unwrap();

        assert!(!config.pretty_output);
        assert_eq!(config.serialize_options(), SerializeOptions { pretty: false, indent: 4 });
        assert_eq!(config.plugins.len(), 3);
        assert!(config.plugins[0].enabled);
        assert!(!config.plugins[1].enabled);
        assert_eq!(config.plugins[1].params.as_ref().unwrap()["prefix"], "x-");
        assert_eq!(config.plugins[2].label(), "custom/strip.json");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("svgo.json")).unwrap();
        assert_eq!(config.plugins, PipelineConfig::default_plugins());
        assert_eq!(config.plugins_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_load_resolves_plugins_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svgo.json");
        fs::write(&path, r#"{"pluginsDir": "extra", "plugins": []}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.plugins_dir, Some(dir.path().join("extra")));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svgo.json");
        fs::write(&path, "{ plugins: ").unwrap();

        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
