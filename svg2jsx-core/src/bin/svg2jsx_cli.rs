//! svg2jsx CLI - Optimize exported SVGs into JSX component modules
//!
//! Commands: about, plugins, resolve, compress
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on configuration or module write failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use svg2jsx_core::{
    compress, resolve_plugins, ExportContext, ExportStatus, JsxConverter, LogNotifier,
    PipelineConfig, PluginRegistry, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "svg2jsx-cli")]
#[command(version)]
#[command(about = "svg2jsx CLI - SVG optimization and JSX component export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the pipeline config
    #[arg(short, long, default_value = "svgo.json")]
    config: PathBuf,

    /// Directory external plugin paths are resolved against
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Log debug traces (same as `"debug": true` in the config)
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the tool
    About,

    /// List built-in plugins with their default params
    Plugins,

    /// Print the effective config and resolved plugin list
    Resolve,

    /// Optimize SVG files and write one component module per directory
    Compress {
        /// SVG files to process
        files: Vec<PathBuf>,

        /// Export manifest (`{"exports": [{"path", "format"}]}`)
        #[arg(short, long)]
        exports: Option<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to serialize output: {}"}}"#, e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config warnings are logged before `debug` is known.
    let loader = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let loaded = tracing::subscriber::with_default(loader, || PipelineConfig::load(&cli.config));

    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            println!(
                "{}",
                serde_json::json!({ "success": false, "error": e.to_string() })
            );
            return ExitCode::FAILURE;
        }
    };
    if cli.plugins_dir.is_some() {
        config.plugins_dir = cli.plugins_dir;
    }
    config.debug |= cli.debug;
    init_logging(config.debug);

    let registry = PluginRegistry::default();

    match cli.command {
        Commands::About => print_json(&serde_json::json!({
            "name": "svg2jsx",
            "version": ENGINE_VERSION,
            "description": "Exports compressed SVG assets to a ready-to-use .jsx file \
                            that contains each compressed SVG as a functional component.",
        })),

        Commands::Plugins => {
            let plugins: Vec<_> = registry
                .list()
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name(),
                        "description": p.description(),
                        "params": p.default_params(),
                    })
                })
                .collect();
            print_json(&plugins)
        }

        Commands::Resolve => {
            let resolved: Vec<_> = resolve_plugins(&registry, &config)
                .iter()
                .map(|p| p.to_json())
                .collect();
            print_json(&serde_json::json!({
                "config": config,
                "plugins": resolved,
            }))
        }

        Commands::Compress { files, exports } => {
            let context = match exports {
                Some(manifest) => match ExportContext::load(&manifest) {
                    Ok(c) => c,
                    Err(e) => {
                        println!(
                            "{}",
                            serde_json::json!({ "success": false, "error": e.to_string() })
                        );
                        return ExitCode::FAILURE;
                    }
                },
                None => ExportContext::from_paths(files),
            };

            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!(r#"{{"error": "Failed to start runtime: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            let report = runtime.block_on(compress(
                &context,
                &config,
                &registry,
                Arc::new(JsxConverter::new(config.indent)),
                &LogNotifier,
            ));

            let code = print_json(&report);
            match report.status {
                ExportStatus::Failed { .. } => ExitCode::from(2), // Module write failure
                _ => code,
            }
        }
    }
}
