#![forbid(unsafe_code)]

//! `stdio-probe` — one-shot request/response driver binary.
//!
//! Launches the configured server, sends a single request (JSON-RPC
//! envelope or bare command word), prints the collected response, and
//! always tears the server down — including on ctrl-c.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use stdio_probe::config::ProbeConfig;
use stdio_probe::driver;
use stdio_probe::exchange::CollectPolicy;
use stdio_probe::request::Request;
use stdio_probe::{AppError, ProbeReport, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum CollectMode {
    /// Read one structured reply line.
    SingleLine,
    /// Drain whatever lines arrive within the window.
    Drain,
}

#[derive(Debug, Parser)]
#[command(
    name = "stdio-probe",
    about = "One-shot request/response driver for line-oriented stdio servers",
    version,
    long_about = None
)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server executable (overrides the config file).
    #[arg(long)]
    server: Option<String>,

    /// Server argument; repeat to pass several (overrides the config file).
    #[arg(long = "server-arg")]
    server_args: Vec<String>,

    /// Readiness marker substring to wait for before sending.
    #[arg(long)]
    ready_marker: Option<String>,

    /// Collection strategy (defaults per subcommand).
    #[arg(long, value_enum)]
    collect: Option<CollectMode>,

    /// Write the response content to this file as well as stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: ProbeCommand,
}

#[derive(Debug, Subcommand)]
enum ProbeCommand {
    /// Send a JSON-RPC request and read one structured reply line.
    Call {
        /// Fully qualified method name, e.g. `RPCHandler.GetPR`.
        method: String,

        /// Positional JSON parameter; repeat to pass several.
        #[arg(long = "param")]
        params: Vec<String>,

        /// Request correlation identifier.
        #[arg(long, default_value_t = 1)]
        id: u64,
    },
    /// Send a bare command word and drain whatever the server prints.
    Send {
        /// Command word, e.g. `hello` or `getReviews`.
        word: String,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(report) => {
            println!("{report}");
            if let ProbeReport::Success { content } = &report {
                println!("{content}");
            }
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!(%err, "probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<ProbeReport> {
    let Cli {
        config: config_path,
        server,
        server_args,
        ready_marker,
        collect,
        output,
        log_format: _,
        command,
    } = args;

    // ── Load configuration, apply CLI overrides ─────────
    let mut config = match config_path {
        Some(path) => ProbeConfig::from_toml_path(&path)?,
        None => ProbeConfig::default(),
    };
    if let Some(server) = server {
        config.server_command = server;
    }
    if !server_args.is_empty() {
        config.server_args = server_args;
    }
    if ready_marker.is_some() {
        config.ready_marker = ready_marker;
    }
    config.validate()?;
    info!(server = %config.server_command, "configuration loaded");

    // ── Build the request and pick the collection policy ─
    let (request, default_mode) = build_request(command)?;
    let mode = collect.unwrap_or(default_mode);
    let policy = match mode {
        CollectMode::SingleLine => CollectPolicy::SingleLine {
            overall: config.response_timeout(),
        },
        CollectMode::Drain => CollectPolicy::BoundedDrain {
            window: config.drain_window(),
        },
    };

    // ── Run the probe with interrupt-aware teardown ─────
    let cancel = CancellationToken::new();
    spawn_interrupt_watch(cancel.clone());

    let report = driver::run(&config, &request, policy, &cancel).await;

    // ── Optional content sink ───────────────────────────
    if let ProbeReport::Success { content } = &report {
        if let Some(path) = &output {
            std::fs::write(path, content)
                .map_err(|err| AppError::Io(format!("failed to write {}: {err}", path.display())))?;
            info!(path = %path.display(), "content written");
        }
    }

    Ok(report)
}

/// Build the request for the chosen subcommand, with its default
/// collection mode: `call` reads one structured reply, `send` drains.
fn build_request(command: ProbeCommand) -> Result<(Request, CollectMode)> {
    match command {
        ProbeCommand::Call { method, params, id } => {
            let mut values = Vec::with_capacity(params.len());
            for raw in &params {
                let value = serde_json::from_str(raw)
                    .map_err(|err| AppError::Config(format!("invalid --param JSON: {err}")))?;
                values.push(value);
            }
            Ok((Request::rpc(method, values, id), CollectMode::SingleLine))
        }
        ProbeCommand::Send { word } => Ok((Request::bare(word)?, CollectMode::Drain)),
    }
}

/// Cancel the token on ctrl-c so an interrupt still reaches teardown.
fn spawn_interrupt_watch(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "ctrl-c handler failed");
            return;
        }
        info!("interrupt received, tearing down");
        cancel.cancel();
    });
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
