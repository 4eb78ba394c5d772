// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_cli::{AnalysisConfig, AnalysisInput, prepare_analysis, run_analysis};
use bcp_core::{BcpError, ExecutionContext};
use bcp_report::ResultsStore;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "bcp",
    about = "Bayesian change-point inference for event-driven structural breaks",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit every configured model variant and compare them.
    Fit(FitArgs),
    /// Validate the configuration (and specifications, given an input) without sampling.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct FitArgs {
    /// JSON file with `prices` or `returns`, and optional `events`.
    #[arg(long)]
    input: PathBuf,
    /// JSON analysis config; defaults apply to missing fields.
    #[arg(long, env = "BCP_CONFIG")]
    config: Option<PathBuf>,
    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, env = "BCP_CONFIG")]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Debug, Default, Args)]
struct Overrides {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    draws: Option<usize>,
    #[arg(long)]
    tune: Option<usize>,
    #[arg(long)]
    chains: Option<usize>,
    /// Number of breaks for every variant.
    #[arg(long)]
    breaks: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(seed) = self.seed {
            config.sampler.seed = seed;
        }
        if let Some(draws) = self.draws {
            config.sampler.draws = draws;
        }
        if let Some(tune) = self.tune {
            config.sampler.tune = tune;
        }
        if let Some(chains) = self.chains {
            config.sampler.chains = chains;
        }
        if let Some(breaks) = self.breaks {
            config.override_breaks(breaks);
        }
    }
}

#[derive(Debug)]
enum CliError {
    Bcp(BcpError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
}

impl CliError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Bcp(err) => err.kind(),
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bcp(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl From<BcpError> for CliError {
    fn from(err: BcpError) -> Self {
        Self::Bcp(err)
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    variants: Vec<VariantCheck>,
}

#[derive(Serialize)]
struct VariantCheck {
    name: String,
    n_breaks: usize,
    n_params: Option<usize>,
    break_bounds: Option<(usize, usize)>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log);
    if let Err(err) = run(cli) {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Validate(args) => handle_validate(args),
    }
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<AnalysisConfig, CliError> {
    let mut config = match path {
        Some(path) => read_json(path)?,
        None => AnalysisConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn handle_fit(args: FitArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;
    let input: AnalysisInput = read_json(&args.input)?;
    let store = ResultsStore::new();
    let outcome = run_analysis(&input, &config, &store, &ExecutionContext::new())?;
    tracing::info!(
        published = store.len(),
        comparison = outcome.report.comparison.is_some(),
        "analysis finished"
    );
    write_json_output(&outcome.report, args.output.as_deref())
}

fn handle_validate(args: ValidateArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;
    let variants = match args.input.as_deref() {
        Some(path) => {
            let input: AnalysisInput = read_json(path)?;
            prepare_analysis(&input, &config)?
                .specs
                .iter()
                .map(|spec| VariantCheck {
                    name: spec.name().to_string(),
                    n_breaks: spec.n_breaks(),
                    n_params: Some(spec.layout().len()),
                    break_bounds: Some(spec.break_bounds()),
                })
                .collect()
        }
        None => config
            .variants
            .iter()
            .map(|variant| VariantCheck {
                name: variant.name.clone(),
                n_breaks: variant.n_breaks,
                n_params: None,
                break_bounds: None,
            })
            .collect(),
    };
    write_json_output(
        &ValidationReport {
            valid: true,
            variants,
        },
        None,
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    serde_json::from_str(&raw)
        .map_err(|source| CliError::json(format!("failed to parse '{}'", path.display()), source))
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
