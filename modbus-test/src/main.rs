mod address;
pub mod args;
pub mod connect;
pub mod server;
mod util;

use std::process::ExitCode;

use args::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let is_server = cli.host == "server";

    // RUST_LOG overrides; the interactive client stays quiet so logs don't interleave with the prompt
    let default_level = if is_server { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    let result = match is_server {
        true => server::run(cli).await,
        false => connect::run(cli).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
