//! Shared-filesystem dispatch transport.
//!
//! Orchestrator and workers see one shared directory. The artifact names
//! are the contract: `params` (shared parameters), `data_{i}` (shard i),
//! `run_{i}` (dispatch marker, containing the job-type wire name as
//! UTF-8 text) and `output_{i}` (shard i's result map). The marker write
//! is the dispatch signal and happens last; workers delete their marker
//! when done, freeing themselves for the next dispatch.
//!
//! All writes are atomic (temp + rename) and stale artifacts of a prior
//! failed run are removed before dispatching, so a half-written or
//! leftover file can never be mistaken for a fresh result. Outputs are
//! awaited by fixed-interval polling under a per-shard deadline; a
//! missing shard is re-signalled a bounded number of times before the
//! dispatch fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::job::JobKind;
use crate::multiproc::{IndexedSample, ResultMap};
use crate::util::write_atomic;

use super::{encode_shards, merge_shard_maps, DispatchError};

/// Well-known artifact paths inside a dispatch directory.
#[derive(Debug, Clone)]
pub struct DispatchDir {
    dir: PathBuf,
}

impl DispatchDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Shared parameter bundle.
    pub fn params(&self) -> PathBuf {
        self.dir.join("params")
    }

    /// Shard payload for job index `i`.
    pub fn data(&self, i: usize) -> PathBuf {
        self.dir.join(format!("data_{i}"))
    }

    /// Dispatch marker for job index `i`.
    pub fn marker(&self, i: usize) -> PathBuf {
        self.dir.join(format!("run_{i}"))
    }

    /// Result map written by job index `i`.
    pub fn output(&self, i: usize) -> PathBuf {
        self.dir.join(format!("output_{i}"))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Configuration of the file transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDispatchConfig {
    /// Shared directory visible to the orchestrator and all workers.
    pub dir: PathBuf,
    /// Worker slots; one shard per slot.
    pub num_jobs: usize,
    /// Output poll interval.
    pub poll_interval: Duration,
    /// Deadline per shard before it is re-signalled or given up on.
    pub shard_timeout: Duration,
    /// Marker rewrites allowed per stalled shard before failing.
    pub max_resignals: u32,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp_data"),
            num_jobs: 20,
            poll_interval: Duration::from_secs(5),
            shard_timeout: Duration::from_secs(600),
            max_resignals: 1,
        }
    }
}

/// Orchestrator side of the file transport.
#[derive(Debug, Clone)]
pub struct FileDispatch {
    config: FileDispatchConfig,
}

impl FileDispatch {
    pub fn new(config: FileDispatchConfig) -> Self {
        Self { config }
    }

    /// Dispatches striped shards to the worker slots and aggregates the
    /// outputs. All dispatch artifacts are deleted on success.
    pub async fn dispatch<S, P, R>(
        &self,
        job: JobKind,
        samples: &[IndexedSample<S>],
        params: &P,
    ) -> Result<ResultMap<R>, DispatchError>
    where
        S: Serialize + Clone,
        P: Serialize,
        R: DeserializeOwned,
    {
        let run_id = Uuid::new_v4();
        let num_jobs = self.config.num_jobs.max(1);
        let dirs = DispatchDir::new(&self.config.dir);
        tokio::fs::create_dir_all(dirs.path()).await?;

        info!(%run_id, %job, samples = samples.len(), num_jobs, dir = %dirs.path().display(), "file dispatch starting");
        self.remove_stale_artifacts(&dirs, num_jobs).await?;

        let params_bytes = bincode::serialize(params).map_err(DispatchError::Encode)?;
        write_atomic(&dirs.params(), params_bytes).await?;

        let shards = encode_shards(samples, num_jobs)?;
        for (i, shard) in shards.into_iter().enumerate() {
            write_atomic(&dirs.data(i), shard).await?;
            // The marker is the dispatch signal; it goes last.
            write_atomic(&dirs.marker(i), job.wire_name().as_bytes().to_vec()).await?;
        }

        self.await_outputs(&dirs, num_jobs, job).await?;

        let shard_maps = futures::future::try_join_all((0..num_jobs).map(|i| {
            let path = dirs.output(i);
            async move {
                let bytes = tokio::fs::read(path).await?;
                bincode::deserialize::<ResultMap<R>>(&bytes).map_err(DispatchError::Decode)
            }
        }))
        .await?;
        let merged = merge_shard_maps(shard_maps)?;

        self.remove_stale_artifacts(&dirs, num_jobs).await?;
        info!(%run_id, results = merged.len(), "file dispatch aggregated");
        Ok(merged)
    }

    /// Polls until every `output_{i}` exists, re-signalling stalled
    /// shards up to the configured bound.
    async fn await_outputs(
        &self,
        dirs: &DispatchDir,
        num_jobs: usize,
        job: JobKind,
    ) -> Result<(), DispatchError> {
        let mut signalled_at = vec![Instant::now(); num_jobs];
        let mut resignals = vec![0u32; num_jobs];

        loop {
            let mut missing = Vec::new();
            for i in 0..num_jobs {
                if !tokio::fs::try_exists(dirs.output(i)).await? {
                    missing.push(i);
                }
            }
            if missing.is_empty() {
                return Ok(());
            }

            let mut exhausted = Vec::new();
            for &i in &missing {
                if signalled_at[i].elapsed() < self.config.shard_timeout {
                    continue;
                }
                if resignals[i] < self.config.max_resignals {
                    warn!(shard = i, "shard stalled, re-signalling marker");
                    write_atomic(&dirs.marker(i), job.wire_name().as_bytes().to_vec()).await?;
                    signalled_at[i] = Instant::now();
                    resignals[i] += 1;
                } else {
                    exhausted.push(i);
                }
            }
            if !exhausted.is_empty() {
                return Err(DispatchError::ShardsTimedOut { missing: exhausted });
            }

            debug!(waiting = missing.len(), "outputs pending");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Deletes every dispatch artifact, present or not.
    async fn remove_stale_artifacts(
        &self,
        dirs: &DispatchDir,
        num_jobs: usize,
    ) -> Result<(), DispatchError> {
        let mut paths = vec![dirs.params()];
        for i in 0..num_jobs {
            paths.push(dirs.data(i));
            paths.push(dirs.marker(i));
            paths.push(dirs.output(i));
        }
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
