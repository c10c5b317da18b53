//! Optimization Pipeline - Ordered plugin passes over one document
//!
//! The resolved plugin list is shared by every file of a batch. Per-file
//! parameters (the `cleanupIDs` prefix) are written to a private copy of the
//! list, never to the shared one.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::ConvertError;
use crate::config::PipelineConfig;
use crate::document::{Document, DocumentError, SerializeOptions};
use crate::naming::id_prefix;
use crate::plugins::{resolve_plugins, PluginError, PluginRegistry, ResolvedPlugin};

/// Plugin whose `prefix` param is derived from each file name.
pub const PREFIX_PLUGIN: &str = "cleanupIDs";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Plugin {plugin} failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: PluginError,
    },
}

/// Failure of a single file. Other files of the batch are unaffected.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Plugin {plugin} failed on {path}: {source}")]
    Plugin {
        path: PathBuf,
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("Failed to convert {path} to a component: {source}")]
    Convert {
        path: PathBuf,
        #[source]
        source: ConvertError,
    },

    #[error("Timed out after {timeout_ms}ms processing {path}")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("Task processing {path} aborted: {message}")]
    Aborted { path: PathBuf, message: String },
}

impl TransformError {
    pub fn path(&self) -> &Path {
        match self {
            TransformError::Read { path, .. }
            | TransformError::Parse { path, .. }
            | TransformError::Plugin { path, .. }
            | TransformError::Convert { path, .. }
            | TransformError::Timeout { path, .. }
            | TransformError::Aborted { path, .. } => path,
        }
    }
}

/// How the pass loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PassOutcome {
    /// Multipass disabled.
    Single,
    /// The last pass changed nothing.
    Converged { passes: usize },
    /// Stopped at `max_passes` while the document was still changing.
    IterationLimit { passes: usize },
}

impl PassOutcome {
    pub fn passes(&self) -> usize {
        match self {
            PassOutcome::Single => 1,
            PassOutcome::Converged { passes } | PassOutcome::IterationLimit { passes } => *passes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub multipass: bool,
    pub max_passes: usize,
    pub serialize: SerializeOptions,
}

impl RunOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            multipass: config.multipass,
            max_passes: config.max_passes.max(1),
            serialize: config.serialize_options(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub markup: String,
    pub outcome: PassOutcome,
}

fn apply_pass(doc: &mut Document, plugins: &[ResolvedPlugin]) -> Result<(), PipelineError> {
    for plugin in plugins.iter().filter(|p| p.active) {
        plugin.apply(doc).map_err(|source| PipelineError::Plugin {
            plugin: plugin.plugin_name.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Apply `plugins` in order and serialize the result.
///
/// With multipass the whole sequence repeats until a pass leaves the
/// document structurally unchanged or `max_passes` is reached. Hitting the
/// ceiling is logged, not an error.
pub fn run(
    mut doc: Document,
    plugins: &[ResolvedPlugin],
    options: &RunOptions,
) -> Result<Optimized, PipelineError> {
    let outcome = if options.multipass {
        let mut passes = 0;
        loop {
            let before = doc.clone();
            apply_pass(&mut doc, plugins)?;
            passes += 1;
            if doc == before {
                break PassOutcome::Converged { passes };
            }
            if passes >= options.max_passes {
                warn!(passes, "multipass stopped at iteration limit before converging");
                break PassOutcome::IterationLimit { passes };
            }
        }
    } else {
        apply_pass(&mut doc, plugins)?;
        PassOutcome::Single
    };

    Ok(Optimized {
        markup: doc.to_svg(&options.serialize),
        outcome,
    })
}

/// Copy of `plugins` with per-file params filled in for `path`.
pub fn plugins_for_file(plugins: &[ResolvedPlugin], path: &Path) -> Vec<ResolvedPlugin> {
    let mut own = plugins.to_vec();
    for plugin in own.iter_mut().filter(|p| p.canonical_name == PREFIX_PLUGIN) {
        let prefix = id_prefix(path);
        debug!(file = %path.display(), prefix = %prefix, "Setting cleanupIDs prefix");
        plugin.set_param("prefix", prefix);
    }
    own
}

/// The optimization pipeline - one resolved plugin list, many files
#[derive(Debug, Clone)]
pub struct Optimizer {
    plugins: Arc<[ResolvedPlugin]>,
    options: RunOptions,
}

impl Optimizer {
    pub fn new(plugins: Vec<ResolvedPlugin>, options: RunOptions) -> Self {
        Self {
            plugins: plugins.into(),
            options,
        }
    }

    pub fn from_config(registry: &PluginRegistry, config: &PipelineConfig) -> Self {
        Self::new(resolve_plugins(registry, config), RunOptions::from_config(config))
    }

    pub fn plugins(&self) -> &[ResolvedPlugin] {
        &self.plugins
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Parse, transform and serialize one file's markup.
    pub fn optimize(&self, path: &Path, source: &str) -> Result<Optimized, TransformError> {
        let plugins = plugins_for_file(&self.plugins, path);

        let doc = Document::parse(source).map_err(|source| TransformError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        run(doc, &plugins, &self.options).map_err(|e| match e {
            PipelineError::Plugin { plugin, source } => TransformError::Plugin {
                path: path.to_path_buf(),
                plugin,
                source,
            },
        })
    }
}
