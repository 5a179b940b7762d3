//! Trellis LSP Binary
//!
//! Run with: `trellis-lsp [--solution PATH] [--log-level LEVEL]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trellis_lsp::{LogLevel, ServerConfig, Settings};
use trellis_model::toolchain::{self, ToolchainQuery, DEFAULT_TOOL_NAME};
use trellis_model::ManifestLoader;

#[derive(Parser)]
#[command(name = "trellis-lsp")]
#[command(about = "Type hierarchy language server for trellis solutions")]
#[command(version)]
struct Cli {
    /// Solution to load instead of discovering one under the workspace root
    #[arg(long, env = "TRELLIS_SOLUTION")]
    solution: Option<PathBuf>,

    /// Log verbosity, for stderr and for messages sent to the client
    #[arg(long, value_enum, default_value_t = LogLevel::Info, env = "TRELLIS_LOG_LEVEL")]
    log_level: LogLevel,

    /// Extra directory to search for the build toolchain (repeatable)
    #[arg(long = "toolchain-dir")]
    toolchain_dirs: Vec<PathBuf>,

    /// Name of the build toolchain executable
    #[arg(long, default_value = DEFAULT_TOOL_NAME)]
    toolchain_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let query = ToolchainQuery::from_env(&cli.toolchain_name).with_dirs(cli.toolchain_dirs);
    let instances = toolchain::discover(&query).context("toolchain discovery failed")?;
    if instances.len() > 1 {
        warn!(
            "Found {} toolchains, using {}",
            instances.len(),
            instances[0].path.display()
        );
    }
    let Some(instance) = instances.into_iter().next() else {
        anyhow::bail!("no `{}` toolchain found", cli.toolchain_name);
    };
    info!("Using toolchain {}", instance.path.display());

    let config = ServerConfig {
        settings: Settings {
            solution_path: cli.solution,
            log_level: cli.log_level,
        },
        loader: Arc::new(ManifestLoader::with_toolchain(instance)),
    };

    trellis_lsp::run_server(config).await
}
