//! Elbfetch CLI - retrieve load-balancer access logs from S3.
//!
//! The main entry point for the `elbfetch` binary.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elbfetch_cli::run::{self, Outcome};
use elbfetch_cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so merged output on stdout stays clean
    let filter = match cli.log_directives() {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    elbfetch_core::metrics::init_metrics();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run::execute(cli)) {
        Ok(Outcome::Completed(_)) => ExitCode::SUCCESS,
        Ok(Outcome::Canceled) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
