//! Export Front End - Manifest intake, module writing and status reporting

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::{BatchOrchestrator, BatchResult};
use crate::component::ComponentConverter;
use crate::config::{ConfigError, PipelineConfig};
use crate::plugins::PluginRegistry;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Failed to write module {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file produced by the design tool's export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArtifact {
    pub path: PathBuf,
    pub format: String,
}

/// Everything one export produced: `{ "exports": [{ "path", "format" }] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportContext {
    #[serde(default)]
    pub exports: Vec<ExportedArtifact>,
}

impl ExportContext {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Context for plain paths; the format is the file extension.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let exports = paths
            .into_iter()
            .map(|p| {
                let path = p.into();
                let format = path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ExportedArtifact { path, format }
            })
            .collect();
        Self { exports }
    }

    /// Paths of the SVG exports, in export order.
    pub fn svg_files(&self) -> Vec<PathBuf> {
        self.exports
            .iter()
            .filter(|e| e.format.eq_ignore_ascii_case("svg"))
            .map(|e| e.path.clone())
            .collect()
    }
}

/// Where the one-line user-facing status goes.
pub trait Notifier: Send + Sync {
    fn message(&self, text: &str);
}

/// Sends status messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn message(&self, text: &str) {
        info!("{text}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ExportStatus {
    /// `enabled: false` in the config.
    Disabled,
    /// The export contained no SVG files.
    NothingToExport,
    Exported {
        modules: Vec<PathBuf>,
        files: usize,
        failures: usize,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    #[serde(flatten)]
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchResult>,
}

/// Write one module per directory; returns the written paths.
pub async fn write_modules(
    result: &BatchResult,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>, AggregationError> {
    let file_name = config.module_file_name();
    let mut written = vec![];

    for module in result.modules() {
        let target = module.directory.join(&file_name);
        tokio::fs::write(&target, module.render())
            .await
            .map_err(|source| AggregationError::Write {
                path: target.clone(),
                source,
            })?;
        info!(
            path = %target.display(),
            components = module.components.len(),
            "module written"
        );
        written.push(target);
    }
    Ok(written)
}

/// Process every SVG export and write the component modules.
pub async fn compress(
    context: &ExportContext,
    config: &PipelineConfig,
    registry: &PluginRegistry,
    converter: Arc<dyn ComponentConverter>,
    notifier: &dyn Notifier,
) -> ExportReport {
    if !config.enabled {
        debug!("compression disabled by config");
        return ExportReport {
            status: ExportStatus::Disabled,
            batch: None,
        };
    }

    let files = context.svg_files();
    if files.is_empty() {
        debug!("no svg exports");
        return ExportReport {
            status: ExportStatus::NothingToExport,
            batch: None,
        };
    }

    debug!(files = files.len(), "Let's go");
    let orchestrator = BatchOrchestrator::from_config(registry, config, converter);
    let batch = orchestrator.process_all(&files).await;

    let status = match write_modules(&batch, config).await {
        Ok(modules) => {
            let text = if modules.is_empty() {
                format!("No jsx components exported, {} files failed", batch.failures.len())
            } else {
                let targets: Vec<String> =
                    modules.iter().map(|m| m.display().to_string()).collect();
                format!(
                    "Successfully exported jsx components to {} ({:.1}% smaller)",
                    targets.join(", "),
                    batch.saved_percent()
                )
            };
            notifier.message(&text);
            ExportStatus::Exported {
                modules,
                files: batch.files.len(),
                failures: batch.failures.len(),
            }
        }
        Err(e) => {
            let message = e.to_string();
            notifier.message(&message);
            ExportStatus::Failed { message }
        }
    };

    ExportReport {
        status,
        batch: Some(batch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::JsxConverter;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn message(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_manifest_filters_svg_case_insensitively() {
        let context: ExportContext = serde_json::from_str(
            r#"{"exports": [
                {"path": "a/one.svg", "format": "svg"},
                {"path": "a/two.png", "format": "png"},
                {"path": "a/three.SVG", "format": "SVG"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            context.svg_files(),
            [PathBuf::from("a/one.svg"), PathBuf::from("a/three.SVG")]
        );

        let from_paths = ExportContext::from_paths(["x/icon.svg", "x/readme"]);
        assert_eq!(from_paths.exports[0].format, "svg");
        assert_eq!(from_paths.svg_files(), [PathBuf::from("x/icon.svg")]);
    }

    #[tokio::test]
    async fn test_compress_writes_index_module() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("arrow left.svg");
        fs::write(&icon, "<svg viewBox=\"0 0 24 24\"><!-- x --><path d=\"M0 0\"/></svg>").unwrap();

        let notifier = Recorder::default();
        let report = compress(
            &ExportContext::from_paths([icon]),
            &PipelineConfig::default(),
            &PluginRegistry::default(),
            Arc::new(JsxConverter::default()),
            &notifier,
        )
        .await;

        let module_path = dir.path().join("index.jsx");
        assert_eq!(
            report.status,
            ExportStatus::Exported {
                modules: vec![module_path.clone()],
                files: 1,
                failures: 0
            }
        );
        let module = fs::read_to_string(&module_path).unwrap();
        assert!(module.starts_with("const ArrowLeft = () => (\n  <svg viewBox=\"0 0 24 24\">\n"));
        assert!(module.ends_with("export { ArrowLeft };\n"));

        let messages = notifier.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Successfully exported jsx components to "));
    }

    #[tokio::test]
    async fn test_compress_disabled_does_nothing() {
        let config = PipelineConfig {
            enabled: false,
            ..PipelineConfig::default()
        };
        let notifier = Recorder::default();
        let report = compress(
            &ExportContext::from_paths(["never/read.svg"]),
            &config,
            &PluginRegistry::default(),
            Arc::new(JsxConverter::default()),
            &notifier,
        )
        .await;

        assert_eq!(report.status, ExportStatus::Disabled);
        assert!(report.batch.is_none());
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("dot.svg");
        fs::write(&icon, "<svg/>").unwrap();
        let config = PipelineConfig {
            output_file_name: "missing-dir/index".to_string(),
            ..PipelineConfig::default()
        };

        let notifier = Recorder::default();
        let report = compress(
            &ExportContext::from_paths([icon]),
            &config,
            &PluginRegistry::default(),
            Arc::new(JsxConverter::default()),
            &notifier,
        )
        .await;

        assert!(matches!(report.status, ExportStatus::Failed { .. }));
        assert!(notifier.0.lock().unwrap()[0].starts_with("Failed to write module"));
    }
}
