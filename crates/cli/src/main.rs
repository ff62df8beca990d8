//! qpc-wait - watch a quipucords scan job from the command line
//!
//! Exits 0 when the job reaches the requested state, 1 when it fails or
//! the wait times out, and 2 on any other error.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;

use qpc_e2e::api::ApiClient;
use qpc_e2e::qpc::QpcCli;
use qpc_e2e::{
    ApiStatusSource, CliStatusSource, HarnessConfig, HarnessError, JobRef, ScanStatus, StatusSource, WaitOutcome,
    WaitRequest, Waiter,
};

mod output;

use output::OutputFormat;

const EXIT_REACHED: i32 = 0;
const EXIT_NOT_REACHED: i32 = 1;
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "qpc-wait")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness config file (default: $XDG_CONFIG_HOME/camayoc/config.yaml)
    #[arg(long, env = "CAMAYOC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// How to read scan job state
    #[arg(long, value_enum, default_value = "api", global = true)]
    binding: Binding,

    /// Server base URL, overriding qcs.hostname from the config
    #[arg(long, global = true)]
    url: Option<String>,

    /// Path to the qpc binary (cli binding)
    #[arg(long, default_value = "qpc", global = true)]
    qpc: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "plain", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Binding {
    /// HTTP API
    Api,
    /// `qpc scan job`
    Cli,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for a scan job to reach a state
    Wait(WaitArgs),

    /// Show the current record of a scan job
    Show {
        /// Scan job ID
        job: String,
    },
}

#[derive(Args)]
struct WaitArgs {
    /// Scan job ID
    job: String,

    /// State to wait for
    #[arg(short, long, default_value = "completed")]
    status: String,

    /// Wait budget in seconds (default: waiter.timeout_secs from the config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Seconds between polls (default: waiter.interval_secs from the config)
    #[arg(short, long)]
    interval: Option<u64>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            output::print_error(&format!("Failed to create tokio runtime: {}", e));
            std::process::exit(EXIT_ERROR);
        }
    };

    match rt.block_on(run(cli)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(EXIT_ERROR);
        }
    }
}

fn exit_code(outcome: &WaitOutcome) -> i32 {
    if outcome.is_reached() {
        EXIT_REACHED
    } else {
        EXIT_NOT_REACHED
    }
}

/// Returns the process exit code; errors map to [`EXIT_ERROR`]
async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    let source = build_source(&cli, &config)?;

    match cli.command {
        Commands::Wait(args) => {
            let timeout = args.timeout.map(Duration::from_secs).unwrap_or_else(|| config.waiter.timeout());
            let interval = args
                .interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.waiter.interval());

            let job = JobRef::new(args.job);
            let request = WaitRequest::new(job.clone(), ScanStatus::from(args.status), timeout);
            let outcome = Waiter::new()
                .with_interval(interval)
                .wait(&request, source.as_ref())
                .await
                .with_context(|| format!("Polling scan job {}", job))?;

            output::print_outcome(&job, &outcome, cli.format);
            Ok(exit_code(&outcome))
        }
        Commands::Show { job } => {
            let job = JobRef::new(job);
            let record = source
                .fetch_status(&job)
                .await
                .with_context(|| format!("Fetching scan job {}", job))?;
            output::print_record(&job, &record, cli.format);
            Ok(EXIT_REACHED)
        }
    }
}

/// An explicit path must exist; the default path is optional since `--url`
/// or the cli binding may be all that is needed.
fn load_config(path: Option<&std::path::Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path).with_context(|| format!("Loading {}", path.display())),
        None => match HarnessConfig::load_default() {
            Ok(config) => Ok(config),
            Err(HarnessError::ConfigNotFound(path)) => {
                debug!("No config at {}, using defaults", path);
                Ok(HarnessConfig::default())
            }
            Err(e) => Err(e).context("Loading default config"),
        },
    }
}

fn build_source(cli: &Cli, config: &HarnessConfig) -> Result<Box<dyn StatusSource>> {
    Ok(match cli.binding {
        Binding::Api => {
            let client = ApiClient::new(config, cli.url.as_deref())?;
            debug!("Reading scan jobs from {}", client.base_url());
            Box::new(ApiStatusSource::new(client))
        }
        Binding::Cli => Box::new(CliStatusSource::new(QpcCli::new(&cli.qpc))),
    })
}
