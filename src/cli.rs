//! # Omniwire CLI
use crate::{
    config::ReconcilerConfig,
    reconcile::{CancelHandle, Reconciler},
};
use clap::{Parser, Subcommand};
use eyre::Context;
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

/// Reconciles a declarative LayerZero peering graph against the OApps deployed on-chain.
#[derive(Debug, Parser)]
#[command(author, about = "Omniwire", long_about = None)]
pub struct Args {
    /// The configuration file.
    #[arg(long, value_name = "CONFIG", env = "OMNIWIRE_CONFIG", default_value = "omniwire.yaml")]
    pub config: PathBuf,
    /// Print machine readable JSON instead of a summary.
    #[arg(long, global = true)]
    pub json: bool,
    /// Run against empty in-memory chains instead of the configured RPC endpoints.
    #[arg(long, global = true)]
    pub simulate: bool,
    /// Maximum number of submission attempts per step.
    #[arg(long, value_name = "ATTEMPTS", global = true)]
    pub max_attempts: Option<u32>,
    /// Deadline of a single RPC call.
    #[arg(long, value_name = "SECONDS", value_parser = parse_duration_secs, global = true)]
    pub rpc_timeout: Option<Duration>,
    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Validate the configured graph without touching any chain.
    Validate,
    /// Read on-chain state and print the steps a run would take.
    Plan,
    /// Reconcile the chains with the configured graph.
    Apply,
}

impl Args {
    /// Runs the command.
    ///
    /// Returns whether the chains are (or would be) converged.
    pub async fn run(self) -> eyre::Result<bool> {
        let config = self.merge_config(ReconcilerConfig::load_from_file(&self.config)?);
        let graph = config.graph().wrap_err("invalid graph")?;

        if self.command == Command::Validate {
            info!(
                endpoints = graph.endpoints().len(),
                connections = graph.connections().len(),
                "Graph is valid"
            );
            return Ok(true);
        }

        let chains =
            if self.simulate { config.build_simulated_chains() } else { config.build_chains()? };
        let reconciler = Reconciler::new(graph, chains, config.executor.clone())?;

        match self.command {
            Command::Plan => {
                let (_, plan) = reconciler.plan().await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    print!("{plan}");
                }
                Ok(plan.is_empty())
            }
            Command::Apply => {
                let cancel = CancelHandle::new();
                tokio::spawn({
                    let cancel = cancel.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            warn!("Received interrupt, cancelling remaining steps");
                            cancel.cancel();
                        }
                    }
                });

                let report = reconciler.run_with(&cancel).await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{report}");
                }
                Ok(report.is_converged())
            }
            Command::Validate => Ok(true),
        }
    }

    /// Merges [`Args`] values into an existing [`ReconcilerConfig`] instance.
    pub fn merge_config(&self, mut config: ReconcilerConfig) -> ReconcilerConfig {
        if let Some(max_attempts) = self.max_attempts {
            config.executor = config.executor.with_max_attempts(max_attempts);
        }
        if let Some(rpc_timeout) = self.rpc_timeout {
            config.executor = config.executor.with_rpc_timeout(rpc_timeout);
        }
        config
    }
}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_and_overrides() {
        let args = Args::try_parse_from([
            "omniwire",
            "--config",
            "mesh.yaml",
            "apply",
            "--json",
            "--max-attempts",
            "2",
            "--rpc-timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(args.command, Command::Apply);
        assert_eq!(args.config, PathBuf::from("mesh.yaml"));
        assert!(args.json);

        let config = args.merge_config(ReconcilerConfig::default());
        assert_eq!(config.executor.max_attempts, 2);
        assert_eq!(config.executor.rpc_timeout, Duration::from_secs(5));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Args::try_parse_from(["omniwire"]).is_err());
    }
}
