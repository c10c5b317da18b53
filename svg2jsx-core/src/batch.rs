//! Batch Orchestration - Concurrent per-file processing and aggregation
//!
//! Every file is a task on one `JoinSet`. Tasks return their own outcome;
//! sizes, outputs and failures are folded together by a single reducer once
//! every task has settled, so no state is shared between tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::component::{render_component, render_module, Component, ComponentConverter};
use crate::config::PipelineConfig;
use crate::hashing::content_hash;
use crate::naming::component_name;
use crate::pipeline::{Optimizer, PassOutcome, TransformError};
use crate::plugins::PluginRegistry;

/// One successfully processed file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutput {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub component_name: String,
    /// Source length in bytes.
    pub original_size: usize,
    /// Optimized markup length in bytes.
    pub compressed_size: usize,
    pub content_hash: String,
    pub passes: PassOutcome,
    #[serde(skip)]
    pub markup: String,
    #[serde(skip)]
    pub jsx: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
    #[serde(skip)]
    pub error: TransformError,
}

impl From<TransformError> for FileFailure {
    fn from(error: TransformError) -> Self {
        Self {
            path: error.path().to_path_buf(),
            message: error.to_string(),
            error,
        }
    }
}

/// Components destined for one directory's module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub directory: PathBuf,
    pub components: Vec<Component>,
}

impl Module {
    pub fn render(&self) -> String {
        render_module(&self.components)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Successful files in input order.
    pub files: Vec<FileOutput>,
    pub failures: Vec<FileFailure>,
    pub original_total_size: usize,
    pub compressed_total_size: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    /// Size reduction over successful files, in percent.
    pub fn saved_percent(&self) -> f64 {
        if self.original_total_size == 0 {
            return 0.0;
        }
        let saved = self.original_total_size as f64 - self.compressed_total_size as f64;
        saved / self.original_total_size as f64 * 100.0
    }

    /// Components grouped by directory, directories and components in input
    /// order. A name already used in the same directory gets a numeric suffix.
    pub fn modules(&self) -> Vec<Module> {
        let mut modules: Vec<(Module, HashSet<String>)> = vec![];

        for file in &self.files {
            let index = match modules.iter().position(|(m, _)| m.directory == file.directory) {
                Some(index) => index,
                None => {
                    modules.push((
                        Module {
                            directory: file.directory.clone(),
                            components: vec![],
                        },
                        HashSet::new(),
                    ));
                    modules.len() - 1
                }
            };
            let (module, taken) = &mut modules[index];

            let mut name = file.component_name.clone();
            let mut suffix = 2;
            while taken.contains(&name) {
                name = format!("{}{suffix}", file.component_name);
                suffix += 1;
            }
            if name != file.component_name {
                warn!(
                    file = %file.path.display(),
                    name = %name,
                    "component name already used in this directory, renamed"
                );
            }
            taken.insert(name.clone());
            module.components.push(render_component(&name, &file.jsx));
        }

        modules.into_iter().map(|(module, _)| module).collect()
    }
}

/// Fans files out over a `JoinSet` and reduces the outcomes.
pub struct BatchOrchestrator {
    optimizer: Optimizer,
    converter: Arc<dyn ComponentConverter>,
    file_timeout: Option<Duration>,
}

impl BatchOrchestrator {
    pub fn new(optimizer: Optimizer, converter: Arc<dyn ComponentConverter>) -> Self {
        Self {
            optimizer,
            converter,
            file_timeout: None,
        }
    }

    pub fn from_config(
        registry: &PluginRegistry,
        config: &PipelineConfig,
        converter: Arc<dyn ComponentConverter>,
    ) -> Self {
        Self::new(Optimizer::from_config(registry, config), converter)
            .with_file_timeout(config.file_timeout())
    }

    /// Give up on a file after `timeout`. The limit covers the read and the
    /// optimize-and-convert step; an abandoned step finishes in the background
    /// and its result is discarded.
    pub fn with_file_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub async fn process_all(&self, files: &[PathBuf]) -> BatchResult {
        let started_at = Utc::now();
        info!(files = files.len(), "processing batch");

        let mut tasks = JoinSet::new();
        for (index, path) in files.iter().enumerate() {
            let optimizer = self.optimizer.clone();
            let converter = Arc::clone(&self.converter);
            let path = path.clone();
            let timeout = self.file_timeout;
            tasks.spawn(async move {
                let outcome = process_file(optimizer, converter, path, timeout).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Result<FileOutput, TransformError>>> =
            files.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "file task did not complete"),
            }
        }

        reduce(files, slots, started_at)
    }
}

fn reduce(
    files: &[PathBuf],
    slots: Vec<Option<Result<FileOutput, TransformError>>>,
    started_at: DateTime<Utc>,
) -> BatchResult {
    let mut result = BatchResult {
        files: vec![],
        failures: vec![],
        original_total_size: 0,
        compressed_total_size: 0,
        started_at,
        finished_at: started_at,
    };

    for (path, slot) in files.iter().zip(slots) {
        let outcome = slot.unwrap_or_else(|| {
            Err(TransformError::Aborted {
                path: path.clone(),
                message: "task panicked or was cancelled".to_string(),
            })
        });
        match outcome {
            Ok(output) => {
                result.original_total_size += output.original_size;
                result.compressed_total_size += output.compressed_size;
                result.files.push(output);
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "file skipped");
                result.failures.push(FileFailure::from(e));
            }
        }
    }

    result.finished_at = Utc::now();
    info!(
        processed = result.files.len(),
        failed = result.failures.len(),
        original = result.original_total_size,
        compressed = result.compressed_total_size,
        "batch finished"
    );
    result
}

async fn process_file(
    optimizer: Optimizer,
    converter: Arc<dyn ComponentConverter>,
    path: PathBuf,
    timeout: Option<Duration>,
) -> Result<FileOutput, TransformError> {
    let Some(limit) = timeout else {
        return transform_file(optimizer, converter, path).await;
    };
    let timed_out = TransformError::Timeout {
        path: path.clone(),
        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    };
    tokio::time::timeout(limit, transform_file(optimizer, converter, path))
        .await
        .map_err(|_| timed_out)?
}

async fn transform_file(
    optimizer: Optimizer,
    converter: Arc<dyn ComponentConverter>,
    path: PathBuf,
) -> Result<FileOutput, TransformError> {
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| TransformError::Read {
            path: path.clone(),
            source,
        })?;

    // Plugins and conversion are synchronous; off the runtime they can be
    // abandoned by the timeout.
    let task_path = path.clone();
    tokio::task::spawn_blocking(move || {
        build_output(&optimizer, converter.as_ref(), &task_path, source)
    })
    .await
    .map_err(|e| TransformError::Aborted {
        path,
        message: e.to_string(),
    })?
}

fn build_output(
    optimizer: &Optimizer,
    converter: &dyn ComponentConverter,
    path: &Path,
    source: String,
) -> Result<FileOutput, TransformError> {
    let optimized = optimizer.optimize(path, &source)?;
    let jsx = converter
        .convert(&optimized.markup)
        .map_err(|source| TransformError::Convert {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(FileOutput {
        path: path.to_path_buf(),
        directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        component_name: component_name(path),
        original_size: source.len(),
        compressed_size: optimized.markup.len(),
        content_hash: content_hash(&optimized.markup),
        passes: optimized.outcome,
        markup: optimized.markup,
        jsx,
    })
}
