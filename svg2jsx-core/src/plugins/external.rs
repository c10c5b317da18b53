//! External Plugins - Declarative passes loaded from JSON files
//!
//! ```json
//! {
//!   "name": "brandColors",
//!   "engine": ">=0.1.0",
//!   "params": { "fill": "currentColor" },
//!   "rules": [
//!     { "op": "removeAttributes", "patterns": ["data-.*"] },
//!     { "op": "setAttributes", "element": "path", "attributes": { "fill": "$fill" } }
//!   ]
//! }
//! ```
//!
//! Everything is validated when the file is loaded; only parameter
//! substitution can fail at apply time.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{Params, Plugin, PluginError};
use crate::document::{Document, Node};
use crate::naming::base_name;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("Failed to read plugin {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plugin {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Plugin {0}: `params` must be an object")]
    ParamsShape(PathBuf),

    #[error("Plugin {path}: invalid pattern `{pattern}`: {source}")]
    Pattern {
        path: PathBuf,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Plugin {path}: invalid engine requirement `{requirement}`")]
    EngineRequirement { path: PathBuf, requirement: String },

    #[error("Plugin {name} requires engine {requirement}, current is {current}")]
    EngineMismatch {
        name: String,
        requirement: String,
        current: String,
    },

    #[error("Plugin {0} has no name")]
    Unnamed(PathBuf),
}

#[derive(Debug, Deserialize)]
struct PluginFile {
    name: Option<String>,
    engine: Option<String>,
    #[serde(default)]
    description: String,
    params: Option<Value>,
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum RuleSpec {
    RemoveElements {
        names: Vec<String>,
    },
    RemoveAttributes {
        patterns: Vec<String>,
    },
    SetAttributes {
        #[serde(default)]
        element: Option<String>,
        attributes: BTreeMap<String, String>,
    },
}

#[derive(Debug)]
enum Rule {
    RemoveElements(Vec<String>),
    RemoveAttributes(Vec<Regex>),
    /// `element: None` targets the root element.
    SetAttributes {
        element: Option<String>,
        attributes: Vec<(String, String)>,
    },
}

#[derive(Debug)]
pub struct ExternalPlugin {
    name: String,
    description: String,
    params: Option<Params>,
    rules: Vec<Rule>,
}

impl ExternalPlugin {
    pub fn load(path: &Path) -> Result<Self, PluginLoadError> {
        let content = fs::read_to_string(path).map_err(|source| PluginLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: PluginFile =
            serde_json::from_str(&content).map_err(|source| PluginLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let name = match file.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => base_name(path),
        };
        if name.is_empty() {
            return Err(PluginLoadError::Unnamed(path.to_path_buf()));
        }

        if let Some(requirement) = &file.engine {
            check_engine(path, &name, requirement)?;
        }

        let params = match file.params {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => return Err(PluginLoadError::ParamsShape(path.to_path_buf())),
        };

        let rules = file
            .rules
            .into_iter()
            .map(|rule| compile_rule(path, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            description: file.description,
            params,
            rules,
        })
    }
}

fn check_engine(path: &Path, name: &str, requirement: &str) -> Result<(), PluginLoadError> {
    let req = semver::VersionReq::parse(requirement).map_err(|_| {
        PluginLoadError::EngineRequirement {
            path: path.to_path_buf(),
            requirement: requirement.to_string(),
        }
    })?;
    if let Ok(current) = semver::Version::parse(ENGINE_VERSION) {
        if !req.matches(&current) {
            return Err(PluginLoadError::EngineMismatch {
                name: name.to_string(),
                requirement: requirement.to_string(),
                current: ENGINE_VERSION.to_string(),
            });
        }
    }
    Ok(())
}

fn compile_rule(path: &Path, rule: RuleSpec) -> Result<Rule, PluginLoadError> {
    Ok(match rule {
        RuleSpec::RemoveElements { names } => Rule::RemoveElements(names),
        RuleSpec::RemoveAttributes { patterns } => {
            let compiled = patterns
                .into_iter()
                .map(|pattern| {
                    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                        PluginLoadError::Pattern {
                            path: path.to_path_buf(),
                            pattern,
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Rule::RemoveAttributes(compiled)
        }
        RuleSpec::SetAttributes {
            element,
            attributes,
        } => Rule::SetAttributes {
            element,
            attributes: attributes.into_iter().collect(),
        },
    })
}

/// `$key` pulls a value from the effective params; anything else is literal.
fn substitute(value: &str, params: &Params) -> Result<String, PluginError> {
    let Some(key) = value.strip_prefix('$') else {
        return Ok(value.to_string());
    };
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(PluginError::MissingParam(key.to_string())),
        Some(other) => Ok(other.to_string()),
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn default_params(&self) -> Option<Params> {
        self.params.clone()
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        for rule in &self.rules {
            match rule {
                Rule::RemoveElements(names) => doc.retain_nodes(|node| match node {
                    Node::Element(el) => !names.contains(&el.name),
                    _ => true,
                }),
                Rule::RemoveAttributes(patterns) => doc.walk_mut(&mut |el| {
                    el.attributes
                        .retain(|attr| !patterns.iter().any(|p| p.is_match(&attr.name)))
                }),
                Rule::SetAttributes {
                    element,
                    attributes,
                } => {
                    let resolved = attributes
                        .iter()
                        .map(|(name, value)| -> Result<(String, String), PluginError> {
                            Ok((name.clone(), substitute(value, params)?))
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    match element {
                        Some(target) => doc.walk_mut(&mut |el| {
                            if &el.name == target {
                                for (name, value) in &resolved {
                                    el.set_attr(name.as_str(), value.as_str());
                                }
                            }
                        }),
                        None => {
                            if let Some(root) = doc.root_mut() {
                                for (name, value) in &resolved {
                                    root.set_attr(name.as_str(), value.as_str());
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, PluginSpec};
    use crate::document::SerializeOptions;
    use crate::plugins::{resolve_plugins, PluginRegistry};
    use serde_json::json;

    fn write_plugin(dir: &Path, file: &str, body: &str) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, body).unwrap();
        path
    }

    const BRAND: &str = r#"{
        "name": "brandColors",
        "engine": ">=0.1.0",
        "params": { "fill": "currentColor", "focusable": false },
        "rules": [
            { "op": "removeElements", "names": ["title"] },
            { "op": "removeAttributes", "patterns": ["data-.*"] },
            { "op": "setAttributes", "element": "path", "attributes": { "fill": "$fill" } },
            { "op": "setAttributes", "attributes": { "focusable": "$focusable" } }
        ]
    }"#;

    #[test]
    fn test_load_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = ExternalPlugin::load(&write_plugin(dir.path(), "brand.json", BRAND)).unwrap();
        assert_eq!(plugin.name(), "brandColors");
        assert_eq!(plugin.default_params().unwrap()["fill"], json!("currentColor"));

        let mut doc = Document::parse(
            r#"<svg data-name="x"><title>t</title><path data-id="1" d="M0 0"/></svg>"#,
        )
        .unwrap();
        plugin.apply(&mut doc, &plugin.default_params().unwrap()).unwrap();

        let out = doc.to_svg(&SerializeOptions { pretty: false, indent: 0 });
        assert_eq!(out, r#"<svg focusable="false"><path d="M0 0" fill="currentColor"/></svg>"#);
    }

    #[test]
    fn test_missing_substitution_param_fails_apply() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = ExternalPlugin::load(&write_plugin(dir.path(), "brand.json", BRAND)).unwrap();
        let mut doc = Document::parse("<svg><path/></svg>").unwrap();

        let err = plugin.apply(&mut doc, &Params::new()).unwrap_err();
        assert!(matches!(err, PluginError::MissingParam(ref key) if key == "fill"));
    }

    #[test]
    fn test_name_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(dir.path(), "stripData.json", r#"{"rules": []}"#);
        let plugin = ExternalPlugin::load(&path).unwrap();
        assert_eq!(plugin.name(), "stripData");
        assert!(plugin.default_params().is_none());
    }

    #[test]
    fn test_load_validation_errors() {
        let dir = tempfile::tempdir().unwrap();

        let bad_params = write_plugin(dir.path(), "a.json", r#"{"params": [1, 2]}"#);
        assert!(matches!(
            ExternalPlugin::load(&bad_params),
            Err(PluginLoadError::ParamsShape(_))
        ));

        let bad_regex = write_plugin(
            dir.path(),
            "b.json",
            r#"{"rules": [{"op": "removeAttributes", "patterns": ["("]}]}"#,
        );
        assert!(matches!(
            ExternalPlugin::load(&bad_regex),
            Err(PluginLoadError::Pattern { .. })
        ));

        let future = write_plugin(dir.path(), "c.json", r#"{"engine": ">=99.0.0"}"#);
        assert!(matches!(
            ExternalPlugin::load(&future),
            Err(PluginLoadError::EngineMismatch { .. })
        ));

        assert!(matches!(
            ExternalPlugin::load(&dir.path().join("missing.json")),
            Err(PluginLoadError::Io { .. })
        ));
    }

    #[test]
    fn test_resolve_external_spec_merges_params() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "brand.json", BRAND);

        let config = PipelineConfig {
            plugins: vec![
                PluginSpec::external("brand.json").with_params(json!({"fill": "red"})),
                PluginSpec::external("broken.json"),
                PluginSpec::named("removeComments"),
            ],
            plugins_dir: Some(dir.path().to_path_buf()),
            ..PipelineConfig::default()
        };

        let resolved = resolve_plugins(&PluginRegistry::default(), &config);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].canonical_name, "brandColors");
        assert_eq!(resolved[0].plugin_name, "brand.json");
        assert_eq!(resolved[0].param("fill"), Some(&json!("red")));
        assert_eq!(resolved[0].param("focusable"), Some(&json!(false)));
    }
}
