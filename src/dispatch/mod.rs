//! Remote job dispatch.
//!
//! Two transports ship shards to independently scheduled worker
//! processes and recover their result maps:
//!
//! - [`FileDispatch`]: artifacts in a shared directory, marker files as
//!   the dispatch signal, fixed-interval polling for outputs.
//! - [`SocketDispatch`]: TCP with length-prefixed frames; workers dial
//!   in, one connection per shard exchange.
//!
//! Both take `(samples, params, job kind, numJobs)` and return one
//! aggregated [`ResultMap`]. Shards are striped, carry global indices,
//! and merge by disjoint union, so shard completion order never affects
//! the result. Both transports run under bounded deadlines and surface
//! stalled shards as errors instead of waiting forever.

pub mod file;
pub mod frame;
pub mod socket;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobKind;
use crate::multiproc::{
    stripe_shards, IndexedSample, Multiprocessor, MultiprocSettings, ResultMap, SampleProcessor,
};

pub use file::{DispatchDir, FileDispatch, FileDispatchConfig};
pub use frame::{read_frame, write_frame, FrameError, JobEnvelope, MAX_FRAME_LEN};
pub use socket::{SocketDispatch, SocketDispatchConfig};

/// Errors of shard dispatch and aggregation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("failed to encode dispatch payload: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode shard result: {0}")]
    Decode(#[source] bincode::Error),

    #[error("sample index {0} appeared in more than one shard result")]
    DuplicateIndex(usize),

    #[error("shards {missing:?} produced no output within the deadline")]
    ShardsTimedOut { missing: Vec<usize> },

    #[error("shard {shard} failed after {attempts} attempts: {reason}")]
    ShardFailed {
        shard: usize,
        attempts: u32,
        reason: String,
    },

    #[error("dispatch aggregation channel closed unexpectedly")]
    ChannelClosed,

    #[error("local execution task failed: {0}")]
    LocalExecution(String),
}

/// How a phase fans its samples out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// In-process thread pool.
    Local { settings: MultiprocSettings },
    /// Shared-filesystem transport to cluster workers.
    File { config: FileDispatchConfig },
    /// TCP transport to cluster workers.
    Socket { config: SocketDispatchConfig },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Local {
            settings: MultiprocSettings::default(),
        }
    }
}

/// Runs a job's samples through the configured execution mode.
///
/// The processor type ties the sample, parameter and output types
/// together; remotely the same binding is re-established by `job`'s
/// registry entry on the worker.
pub async fn run_distributed<P>(
    mode: &ExecutionMode,
    job: JobKind,
    samples: Vec<IndexedSample<P::Sample>>,
    params: P::Params,
) -> Result<ResultMap<P::Output>, DispatchError>
where
    P: SampleProcessor + Default + 'static,
    P::Sample: Serialize + 'static,
    P::Params: Serialize + 'static,
    P::Output: DeserializeOwned + 'static,
{
    match mode {
        ExecutionMode::Local { settings } => {
            let settings = *settings;
            tokio::task::spawn_blocking(move || {
                Multiprocessor::new(settings).process_batches(&P::default(), &samples, &params)
            })
            .await
            .map_err(|e| DispatchError::LocalExecution(e.to_string()))
        }
        ExecutionMode::File { config } => {
            FileDispatch::new(config.clone())
                .dispatch(job, &samples, &params)
                .await
        }
        ExecutionMode::Socket { config } => {
            SocketDispatch::bind(config.clone())
                .await?
                .dispatch(job, &samples, &params)
                .await
        }
    }
}

/// Serializes striped shards, one opaque payload per job index.
pub(crate) fn encode_shards<S: Serialize>(
    samples: &[IndexedSample<S>],
    num_jobs: usize,
) -> Result<Vec<Vec<u8>>, DispatchError>
where
    S: Clone,
{
    stripe_shards(samples, num_jobs)
        .iter()
        .map(|shard| bincode::serialize(shard).map_err(DispatchError::Encode))
        .collect()
}

/// Disjoint union of shard result maps.
pub(crate) fn merge_shard_maps<R>(
    maps: impl IntoIterator<Item = ResultMap<R>>,
) -> Result<ResultMap<R>, DispatchError> {
    let mut merged = ResultMap::new();
    for map in maps {
        for (index, value) in map {
            if merged.insert(index, value).is_some() {
                return Err(DispatchError::DuplicateIndex(index));
            }
        }
    }
    Ok(merged)
}
