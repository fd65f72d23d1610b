//! qconv: quantized convolution conformance runner
//!
//! Expands the conv1d / conv2d parameter spaces, drives every case through
//! trace, conversion, execution and comparison, and reports per-case outcomes
//! with platform expected failures applied.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use qconv_cli::exit::{EXIT_CONFORMANCE_FAIL, EXIT_GENERIC_FAIL, EXIT_SUCCESS};
use qconv_cli::logging::setup_logging;
use qconv_cli::{ListCommand, RunCommand};
use qconv_common::HarnessConfig;
use std::path::PathBuf;
use tracing::error;

const DEFAULT_CONFIG_FILE: &str = "qconv.toml";

/// Quantized convolution conformance runner
#[derive(Parser)]
#[command(name = "qconv")]
#[command(version)]
#[command(long_about = r#"
Runs the quantized convolution conformance sweep: every case synthesizes a
single quantized conv module, traces it, converts the trace, executes the
converted model and compares the outputs within one output quantization step.

Examples:
  # List the grouped 2-D cases
  qconv list --rank 2d --params g3

  # Run the whole sweep and keep JSON receipts
  qconv run --receipt-dir target/receipts

  # Reproduce the Apple Silicon expected failures
  qconv run --rank 1d --platform macos/aarch64
"#)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List case ids
    #[command(alias = "ls")]
    List(ListCommand),

    /// Run the conformance sweep
    Run(RunCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("Command failed: {e}");
            for cause in e.chain().skip(1) {
                error!("  Caused by: {cause}");
            }
            eprintln!("error: {e:#}");
            EXIT_GENERIC_FAIL
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = load_configuration(&cli)?;
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    setup_logging(&config.logging, cli.log_level.as_deref())?;

    match cli.command {
        Some(Commands::List(cmd)) => {
            cmd.execute()?;
            Ok(EXIT_SUCCESS)
        }
        Some(Commands::Run(cmd)) => {
            let passed = cmd.execute(&config)?;
            Ok(if passed { EXIT_SUCCESS } else { EXIT_CONFORMANCE_FAIL })
        }
        Some(Commands::Config { action: ConfigAction::Show }) => {
            println!("{}", config.to_toml().context("Failed to serialize configuration")?);
            Ok(EXIT_SUCCESS)
        }
        None => {
            Cli::command().print_help()?;
            Ok(EXIT_SUCCESS)
        }
    }
}

/// The given TOML file (or `./qconv.toml` when present), then `QCONV_*`
/// environment overrides.
fn load_configuration(cli: &Cli) -> Result<HarnessConfig> {
    let path = cli.config.clone().or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.is_file().then_some(local)
    });
    let config = match &path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.with_env_overrides().context("Failed to apply environment overrides")
}
