//! File-transport worker.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info};

use crate::dispatch::DispatchDir;
use crate::job::JobKind;
use crate::multiproc::MultiprocSettings;
use crate::util::write_atomic;

use super::WorkerError;

/// Polls a dispatch directory for this slot's marker and executes
/// whatever job it names.
#[derive(Debug, Clone)]
pub struct FileWorker {
    /// Job slot index; selects `data_{i}`, `run_{i}` and `output_{i}`.
    pub index: usize,
    /// Shared dispatch directory.
    pub dir: PathBuf,
    /// Marker poll interval.
    pub poll_interval: Duration,
    /// Local fan-out sizing for executing claimed shards.
    pub settings: MultiprocSettings,
}

impl FileWorker {
    /// Serves forever. Errors are logged and the worker returns to
    /// polling; the process is stopped externally.
    pub async fn run(&self) {
        info!(index = self.index, dir = %self.dir.display(), "file worker polling");
        loop {
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!(index = self.index, error = %e, "worker cycle failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// One poll cycle: returns `Ok(true)` when a job was claimed and
    /// completed, `Ok(false)` when no marker was present.
    pub async fn poll_once(&self) -> Result<bool, WorkerError> {
        let dirs = DispatchDir::new(&self.dir);
        let marker = dirs.marker(self.index);
        if !tokio::fs::try_exists(&marker).await? {
            return Ok(false);
        }

        let job_name = tokio::fs::read_to_string(&marker).await?;
        let job = match JobKind::from_wire_name(job_name.trim()) {
            Ok(job) => job,
            Err(e) => {
                // Free the slot; the orchestrator's deadline will surface
                // the missing output.
                error!(index = self.index, name = %job_name.trim(), "unknown job type in marker");
                tokio::fs::remove_file(&marker).await?;
                return Err(e.into());
            }
        };

        info!(index = self.index, %job, "claimed dispatched job");
        let shard = tokio::fs::read(dirs.data(self.index)).await?;
        let params = tokio::fs::read(dirs.params()).await?;

        let settings = self.settings;
        let output = tokio::task::spawn_blocking(move || job.run(settings, &shard, &params))
            .await
            .map_err(|e| WorkerError::JobPanicked(e.to_string()))??;

        write_atomic(&dirs.output(self.index), output).await?;
        tokio::fs::remove_file(&marker).await?;
        info!(index = self.index, %job, "job completed, marker cleared");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_without_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let worker = FileWorker {
            index: 0,
            dir: dir.path().to_path_buf(),
            poll_interval: Duration::from_millis(5),
            settings: MultiprocSettings { num_procs: 1, num_batches: 1 },
        };
        assert!(!worker.poll_once().await.expect("poll"));
    }

    #[tokio::test]
    async fn unknown_job_type_clears_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dirs = DispatchDir::new(dir.path());
        std::fs::write(dirs.marker(0), "RoutingJob").expect("marker");
        let worker = FileWorker {
            index: 0,
            dir: dir.path().to_path_buf(),
            poll_interval: Duration::from_millis(5),
            settings: MultiprocSettings { num_procs: 1, num_batches: 1 },
        };
        let err = worker.poll_once().await.unwrap_err();
        assert!(matches!(err, WorkerError::Job(_)));
        assert!(!dirs.marker(0).exists());
    }
}
