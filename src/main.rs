use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use tss::cli::{run_cli, Args};

#[tokio::main]
async fn main() {
    // Initialize logging; stdout carries command output, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args
    let args = Args::parse();

    if let Err(e) = run_cli(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
