//! svg2jsx Core - SVG optimization pipeline and JSX component export
//!
//! Exported SVG files run through an ordered list of configurable plugins,
//! optionally until the document stops changing, and are then rendered as
//! functional components, one module per export directory.
//!
//! Data flow: [`PipelineConfig`] -> [`resolve_plugins`] -> [`BatchOrchestrator`]
//! -> [`Optimizer`] per file -> [`ComponentConverter`] -> [`write_modules`].

pub mod batch;
pub mod component;
pub mod config;
pub mod document;
pub mod export;
pub mod hashing;
pub mod naming;
pub mod pipeline;
pub mod plugins;

pub use batch::{BatchOrchestrator, BatchResult, FileFailure, FileOutput, Module};
pub use component::{ComponentConverter, ConvertError, JsxConverter};
pub use config::{ConfigError, PipelineConfig, PluginSpec, RawConfig};
pub use document::{Document, DocumentError, SerializeOptions};
pub use export::{
    compress, write_modules, AggregationError, ExportContext, ExportReport, ExportStatus,
    LogNotifier, Notifier,
};
pub use hashing::{canonical_json, content_hash};
pub use pipeline::{Optimizer, PassOutcome, PipelineError, RunOptions, TransformError};
pub use plugins::{
    resolve_plugins, Params, Plugin, PluginDefinition, PluginError, PluginRegistry,
    ResolvedPlugin,
};

/// Version external plugins declare compatibility against.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
