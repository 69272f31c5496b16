//! Cluster worker provisioning via Slurm.
//!
//! Thin collaborator around `sbatch`/`squeue`/`scancel`: renders one
//! batch script per worker slot, submits it, and can sweep a user's
//! matching jobs away again. Workers provisioned here run the `worker`
//! subcommand of this binary in file or socket flavor.

use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Errors of scheduler interaction.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sbatch failed for slot {index}: {stderr}")]
    Submit { index: usize, stderr: String },

    #[error("sbatch output not understood: {0}")]
    SubmitOutput(String),

    #[error("squeue failed: {0}")]
    Query(String),

    #[error("scancel failed for job {job_id}: {stderr}")]
    Cancel { job_id: String, stderr: String },
}

/// Sizing of a worker fleet.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub worker_count: usize,
    pub cpus_per_worker: u32,
    pub mem_gb: u32,
}

/// Which transport the provisioned workers serve.
#[derive(Debug, Clone)]
pub enum WorkerTarget {
    /// File workers polling a shared dispatch directory.
    File { dir: PathBuf },
    /// Socket workers dialing the orchestrator.
    Socket { connect_addr: String },
}

/// A submitted scheduler job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub index: usize,
}

/// Slurm-backed launcher.
#[derive(Debug, Clone)]
pub struct SlurmLauncher {
    /// Binary the batch script executes; normally this executable.
    pub worker_binary: PathBuf,
    /// Directory for batch scripts and job output files.
    pub logs_dir: PathBuf,
    /// Job name prefix; slot index is appended.
    pub job_name_prefix: String,
}

impl SlurmLauncher {
    /// Renders the batch script for one worker slot.
    pub fn render_script(&self, index: usize, spec: &LaunchSpec, target: &WorkerTarget) -> String {
        let worker_args = match target {
            WorkerTarget::File { dir } => {
                format!("worker --transport file --index {index} --dir {}", dir.display())
            }
            WorkerTarget::Socket { connect_addr } => {
                format!("worker --transport socket --index {index} --connect {connect_addr}")
            }
        };
        let output = self.logs_dir.join(format!("job_output_{index}_%j.txt"));
        format!(
            "#!/bin/bash\n\
             #SBATCH --job-name={prefix}_{index}\n\
             #SBATCH --cpus-per-task={cpus}\n\
             #SBATCH --output={output}\n\
             #SBATCH --mem={mem}G\n\
             {binary} {worker_args}\n",
            prefix = self.job_name_prefix,
            cpus = spec.cpus_per_worker,
            output = output.display(),
            mem = spec.mem_gb,
            binary = self.worker_binary.display(),
        )
    }

    /// Submits one batch job per worker slot. Script files are removed
    /// after submission.
    pub async fn launch(
        &self,
        spec: &LaunchSpec,
        target: &WorkerTarget,
    ) -> Result<Vec<JobHandle>, LaunchError> {
        tokio::fs::create_dir_all(&self.logs_dir).await?;
        let mut handles = Vec::with_capacity(spec.worker_count);
        for index in 0..spec.worker_count {
            let script_path = self.logs_dir.join(format!("job_script_{index}.sh"));
            tokio::fs::write(&script_path, self.render_script(index, spec, target)).await?;

            let output = Command::new("sbatch").arg(&script_path).output().await?;
            if !output.status.success() {
                return Err(LaunchError::Submit {
                    index,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
            // "Submitted batch job <id>"
            let stdout = String::from_utf8_lossy(&output.stdout);
            let job_id = stdout
                .split_whitespace()
                .last()
                .ok_or_else(|| LaunchError::SubmitOutput(stdout.clone().into_owned()))?
                .to_string();
            info!(index, job_id = %job_id, "worker job submitted");
            handles.push(JobHandle { job_id, index });

            tokio::fs::remove_file(&script_path).await?;
        }
        Ok(handles)
    }

    /// Cancels every job of `user` whose name starts with
    /// `{pattern}_`. Returns the number of cancelled jobs.
    pub async fn cancel_all(&self, pattern: &str, user: &str) -> Result<u32, LaunchError> {
        let output = Command::new("squeue")
            .args(["--noheader", "-o", "%.18i %.50j", "-u", user])
            .output()
            .await?;
        if !output.status.success() {
            return Err(LaunchError::Query(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let prefix = format!("{pattern}_");
        let mut cancelled = 0u32;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let mut fields = line.split_whitespace();
            let (Some(job_id), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            let result = Command::new("scancel").arg(job_id).output().await?;
            if result.status.success() {
                info!(job_id, name, "cancelled worker job");
                cancelled += 1;
            } else {
                warn!(job_id, "scancel failed");
                return Err(LaunchError::Cancel {
                    job_id: job_id.to_string(),
                    stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
                });
            }
        }
        Ok(cancelled)
    }
}
