//! CLI command definitions and handlers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::EngineConfig;
use crate::launcher::{LaunchSpec, SlurmLauncher, WorkerTarget};
use crate::multiproc::MultiprocSettings;
use crate::pipeline::{SimulationInputs, SimulationPipeline};
use crate::worker::{FileWorker, SocketWorker};

/// LEO constellation attack-feasibility simulator.
#[derive(Debug, Parser)]
#[command(name = "sat-siege", version, about)]
pub struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which dispatch transport a worker or fleet serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    File,
    Socket,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the simulation pipeline from a configuration file.
    Simulate {
        /// Engine configuration (JSON).
        #[arg(long, default_value = "configurations/config.json")]
        config: PathBuf,
    },

    /// Serve as a long-lived dispatch worker (killed externally).
    Worker {
        /// Transport to serve.
        #[arg(long, value_enum)]
        transport: TransportArg,

        /// Job slot index (file transport).
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Shared dispatch directory (file transport).
        #[arg(long, default_value = "temp_data")]
        dir: PathBuf,

        /// Orchestrator address (socket transport).
        #[arg(long, default_value = "127.0.0.1:40900")]
        connect: SocketAddr,

        /// Worker threads per claimed shard; 0 = number of cores.
        #[arg(long, default_value_t = 0)]
        num_procs: usize,

        /// Batches per claimed shard.
        #[arg(long, default_value_t = 1)]
        num_batches: usize,

        /// Marker poll interval in milliseconds (file transport).
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,
    },

    /// Provision a worker fleet through the cluster scheduler.
    Launch {
        #[arg(long, value_enum)]
        transport: TransportArg,

        /// Number of worker jobs to submit.
        #[arg(long, default_value_t = 20)]
        count: usize,

        /// CPUs per worker job.
        #[arg(long, default_value_t = 8)]
        cpus: u32,

        /// Memory per worker job, in GB.
        #[arg(long, default_value_t = 64)]
        mem_gb: u32,

        /// Directory for batch scripts and job output files.
        #[arg(long, default_value = "logs")]
        logs_dir: PathBuf,

        /// Job name prefix; the slot index is appended.
        #[arg(long, default_value = "siege_worker")]
        job_name_prefix: String,

        /// Shared dispatch directory (file transport).
        #[arg(long, default_value = "temp_data")]
        dir: PathBuf,

        /// Orchestrator address workers dial (socket transport).
        #[arg(long, default_value = "127.0.0.1:40900")]
        connect: String,

        /// Worker binary to run; defaults to this executable.
        #[arg(long)]
        worker_binary: Option<PathBuf>,
    },

    /// Cancel a previously launched worker fleet.
    Cancel {
        /// Job name prefix to match.
        #[arg(long, default_value = "siege_worker")]
        pattern: String,

        /// Scheduler user owning the jobs.
        #[arg(long, env = "USER")]
        user: String,
    },
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Executes the parsed command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Simulate { config } => simulate(&config).await,
        Commands::Worker {
            transport,
            index,
            dir,
            connect,
            num_procs,
            num_batches,
            poll_interval_ms,
        } => {
            let mut settings = MultiprocSettings::default();
            if num_procs > 0 {
                settings.num_procs = num_procs;
            }
            settings.num_batches = num_batches.max(1);
            match transport {
                TransportArg::File => {
                    FileWorker {
                        index,
                        dir,
                        poll_interval: Duration::from_millis(poll_interval_ms),
                        settings,
                    }
                    .run()
                    .await;
                }
                TransportArg::Socket => {
                    SocketWorker {
                        server_addr: connect,
                        retry_backoff: SocketWorker::DEFAULT_BACKOFF,
                        settings,
                    }
                    .run()
                    .await;
                }
            }
            Ok(())
        }
        Commands::Launch {
            transport,
            count,
            cpus,
            mem_gb,
            logs_dir,
            job_name_prefix,
            dir,
            connect,
            worker_binary,
        } => {
            let worker_binary = match worker_binary {
                Some(path) => path,
                None => std::env::current_exe().context("resolving current executable")?,
            };
            let launcher = SlurmLauncher {
                worker_binary,
                logs_dir,
                job_name_prefix,
            };
            let target = match transport {
                TransportArg::File => WorkerTarget::File { dir },
                TransportArg::Socket => WorkerTarget::Socket { connect_addr: connect },
            };
            let spec = LaunchSpec {
                worker_count: count,
                cpus_per_worker: cpus,
                mem_gb,
            };
            let handles = launcher.launch(&spec, &target).await?;
            for handle in &handles {
                println!("slot {} -> job {}", handle.index, handle.job_id);
            }
            info!(submitted = handles.len(), "worker fleet launched");
            Ok(())
        }
        Commands::Cancel { pattern, user } => {
            let launcher = SlurmLauncher {
                worker_binary: PathBuf::new(),
                logs_dir: PathBuf::from("logs"),
                job_name_prefix: pattern.clone(),
            };
            let cancelled = launcher.cancel_all(&pattern, &user).await?;
            println!("cancelled {cancelled} jobs");
            Ok(())
        }
    }
}

/// Loads configuration and inputs, runs the pipeline, prints the report.
async fn simulate(config_path: &PathBuf) -> anyhow::Result<()> {
    let config = EngineConfig::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let pipeline = SimulationPipeline::from_config(&config);
    let inputs: SimulationInputs = pipeline
        .store()
        .load(&config.inputs_path)
        .await
        .with_context(|| format!("loading inputs {}", config.inputs_path.display()))?;

    let (_outputs, report) = pipeline.run(inputs).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_worker_command() {
        let cli = Cli::try_parse_from([
            "sat-siege",
            "worker",
            "--transport",
            "file",
            "--index",
            "3",
            "--dir",
            "/shared/temp_data",
        ])
        .expect("parse");
        match cli.command {
            Commands::Worker { transport, index, dir, .. } => {
                assert_eq!(transport, TransportArg::File);
                assert_eq!(index, 3);
                assert_eq!(dir, PathBuf::from("/shared/temp_data"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_transport() {
        assert!(Cli::try_parse_from(["sat-siege", "worker", "--transport", "carrier-pigeon"])
            .is_err());
    }
}
