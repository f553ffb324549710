//! `docval`: validate `.docx` documents against natural-language rules.
//!
//! Exit codes: 0 when every spec passed, 1 when any failed, 2 on input or
//! configuration errors.

mod render;
mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docval_core::{DocxExtractor, SpecSet};
use docval_runtime::{BackendRegistry, EnvAdapter, Validator};

use render::{InspectFormat, ReportFormat};
use settings::{FileConfig, Overrides};

#[derive(Parser)]
#[command(name = "docval")]
#[command(version, about = "Validate .docx documents against natural-language rules using an LLM")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document against a spec file
    Validate(ValidateArgs),

    /// Print the text and metadata extracted from a document
    Inspect {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: InspectFormat,
    },

    /// List available backends
    Backends,
}

#[derive(Args)]
struct ValidateArgs {
    /// Document to validate (.docx)
    file: PathBuf,

    /// Spec file (.json, .yaml or .yml)
    #[arg(long, short)]
    specs: PathBuf,

    /// Backend name (openai, github, nebulaone)
    #[arg(long, short)]
    backend: Option<String>,

    /// Model to query
    #[arg(long, short)]
    model: Option<String>,

    /// API key (defaults to the backend's environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Endpoint override
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file (YAML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[arg(long, short, value_enum, default_value = "text")]
    format: ReportFormat,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Specs queried at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempts per spec, including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-query timeout (e.g. "30s", "2m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,
}

impl ValidateArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            backend: self.backend.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
            timeout: self.timeout,
            no_cache: self.no_cache,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,docval=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,docval=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns whether the command succeeded outright.
async fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Validate(args) => validate(args).await,
        Commands::Inspect { file, format } => {
            let document = DocxExtractor::new()
                .parse(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            print!("{}", render::document(&document, format)?);
            Ok(true)
        }
        Commands::Backends => {
            print!("{}", render::backends(&BackendRegistry::with_defaults().describe()));
            Ok(true)
        }
    }
}

async fn validate(args: ValidateArgs) -> Result<bool> {
    let registry = BackendRegistry::with_defaults();

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = settings::resolve(
        file_config,
        args.overrides(),
        &registry,
        &EnvAdapter::process(),
    )?;

    let specs = SpecSet::from_file(&args.specs)
        .with_context(|| format!("Failed to load specs from {}", args.specs.display()))?;

    let validator = Validator::from_registry(
        &registry,
        &settings.backend,
        settings.backend_config,
        settings.runtime,
    )?;

    let report = validator
        .validate(&args.file, specs.as_slice())
        .await
        .with_context(|| format!("Failed to validate {}", args.file.display()))?;

    let rendered = render::report(&report, args.format)?;
    write_output(args.output.as_deref(), &rendered)?;

    Ok(report.all_passed())
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => print!("{}", content),
    }
    Ok(())
}
