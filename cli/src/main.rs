//! fetchgate CLI - fetch one URL, or serve the fetch pipeline on a local port.
//!
//! ```text
//! fetchgate fetch <URL>          extracted text on stdout, exit 2/3/4/1 on failure
//! fetchgate serve [--port N]     GET http://127.0.0.1:N/fetch?url=...
//! ```
//!
//! Logs (including audit lines) go to stderr; stdout carries only extracted text.

mod server;

use std::io::stderr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fetchgate_fetch::{FetchGate, GateError, ResolvedConfig};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Parser)]
#[command(
    name = "fetchgate",
    version,
    about = "Safe URL text extraction for research"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a URL and print its extracted text
    Fetch {
        /// URL to fetch
        url: String,
    },
    /// Serve GET /fetch?url=... on 127.0.0.1
    Serve {
        #[arg(long, default_value_t = server::DEFAULT_PORT)]
        port: u16,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_timer(ChronoUtc::new(TIMESTAMP_FORMAT.to_string())),
        )
        .with(env_filter)
        .init();
}

fn build_gate() -> Result<FetchGate, ExitCode> {
    match fetchgate_config::load() {
        Ok(config) => Ok(FetchGate::new(ResolvedConfig::from_config(&config))),
        Err(err) => {
            eprintln!("FetchError: {err}");
            Err(ExitCode::FAILURE)
        }
    }
}

fn exit_status(err: &GateError) -> u8 {
    u8::try_from(err.kind().exit_code()).unwrap_or(1)
}

async fn run_fetch(gate: &FetchGate, url: &str) -> ExitCode {
    match gate.fetch(url).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", err.kind().name(), err.message);
            ExitCode::from(exit_status(&err))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let gate = match build_gate() {
        Ok(gate) => gate,
        Err(code) => return code,
    };

    match cli.command {
        Command::Fetch { url } => run_fetch(&gate, &url).await,
        Command::Serve { port } => match server::serve(Arc::new(gate), port).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("fetchgate: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
