//! Dispatchable job types.
//!
//! The registry is a closed enum: orchestrators put a job's wire name in
//! the dispatch signal (marker file or socket envelope) and workers
//! resolve it back here. Adding a job type means adding a variant, a wire
//! name, and a `run` arm; there is no runtime registration.

pub mod link_attack;
pub mod zone_bottleneck;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::multiproc::{IndexedSample, Multiprocessor, MultiprocSettings, SampleProcessor};

pub use link_attack::LinkAttackProcessor;
pub use zone_bottleneck::ZoneBottleneckProcessor;

/// Errors of worker-side job execution.
#[derive(Debug, Error)]
pub enum JobError {
    /// The dispatch signal named a job this build does not know.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    /// Shard payload did not decode.
    #[error("failed to decode shard: {0}")]
    DecodeShard(#[source] bincode::Error),

    /// Parameter payload did not decode.
    #[error("failed to decode process parameters: {0}")]
    DecodeParams(#[source] bincode::Error),

    /// Result map did not encode.
    #[error("failed to encode result map: {0}")]
    EncodeResult(#[source] bincode::Error),
}

/// The closed set of dispatchable job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Single-link attack feasibility over edge samples.
    LinkAttack,
    /// Zone-pair disconnection analysis over zone-pair samples.
    ZoneBottleneck,
}

impl JobKind {
    /// Every dispatchable job type.
    pub const ALL: [JobKind; 2] = [JobKind::LinkAttack, JobKind::ZoneBottleneck];

    /// Stable name used in marker files and socket envelopes.
    pub fn wire_name(&self) -> &'static str {
        match self {
            JobKind::LinkAttack => "LinkAttackJob",
            JobKind::ZoneBottleneck => "ZoneBottleneckJob",
        }
    }

    /// Resolves a wire name back to a job type.
    pub fn from_wire_name(name: &str) -> Result<Self, JobError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == name)
            .ok_or_else(|| JobError::UnknownJobType(name.to_string()))
    }

    /// Executes one dispatched shard: decode, fan out locally, encode.
    ///
    /// Used identically by the file worker (payloads read from artifact
    /// files) and the socket worker (payloads from the envelope).
    pub fn run(
        &self,
        settings: MultiprocSettings,
        shard_bytes: &[u8],
        params_bytes: &[u8],
    ) -> Result<Vec<u8>, JobError> {
        match self {
            JobKind::LinkAttack => {
                run_processor(&LinkAttackProcessor, settings, shard_bytes, params_bytes)
            }
            JobKind::ZoneBottleneck => {
                run_processor(&ZoneBottleneckProcessor, settings, shard_bytes, params_bytes)
            }
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

fn run_processor<P>(
    processor: &P,
    settings: MultiprocSettings,
    shard_bytes: &[u8],
    params_bytes: &[u8],
) -> Result<Vec<u8>, JobError>
where
    P: SampleProcessor,
    P::Sample: DeserializeOwned,
    P::Params: DeserializeOwned,
    P::Output: Serialize,
{
    let shard: Vec<IndexedSample<P::Sample>> =
        bincode::deserialize(shard_bytes).map_err(JobError::DecodeShard)?;
    let params: P::Params = bincode::deserialize(params_bytes).map_err(JobError::DecodeParams)?;
    let result = Multiprocessor::new(settings).process_batches(processor, &shard, &params);
    bincode::serialize(&result).map_err(JobError::EncodeResult)
}
