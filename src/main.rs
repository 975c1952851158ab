//! # Omniwire
//!
//! Reconciles a declarative LayerZero peering graph against the OApps deployed on-chain.
use clap::Parser;
use omniwire::cli::Args;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    // Logs go to stderr so that `--json` output on stdout stays parseable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    match args.run().await {
        Ok(true) => {}
        // Not converged.
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("Error: {err:?}");
            std::process::exit(1);
        }
    }
}
