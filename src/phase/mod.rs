//! Pipeline phase lifecycle.
//!
//! A phase is one named stage: declared inputs and outputs, a caching
//! policy, a compute step (local or dispatched) and a result check. The
//! runner owns the lifecycle around `compute`:
//!
//! 1. with `read_persist` set and an artifact present, the artifact is
//!    read back and compute is skipped;
//! 2. otherwise the phase computes (input/output arity is carried by the
//!    phase's associated types);
//! 3. `check_result` runs on every result, cached or fresh — a violation
//!    aborts the run;
//! 4. with `persist` set, a freshly computed result is written to the
//!    artifact path.

pub mod cache;
pub mod link_attack;
pub mod traffic;
pub mod zone_bottleneck;

use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dispatch::DispatchError;

pub use cache::{ArtifactStore, CacheError};
pub use link_attack::LinkAttackPhase;
pub use traffic::TrafficPhase;
pub use zone_bottleneck::ZoneBottleneckPhase;

/// Errors of phase execution. All of these abort the pipeline.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("cache artifact error: {0}")]
    Cache(#[from] CacheError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("result check failed: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-phase caching flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Read the artifact instead of computing when it exists.
    pub read_persist: bool,
    /// Write freshly computed results to the artifact path.
    pub persist: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            read_persist: true,
            persist: true,
        }
    }
}

/// One pipeline stage.
#[async_trait]
pub trait Phase: Send + Sync {
    type Input: Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Names of the inputs, in the order `compute` consumes them.
    fn input_properties(&self) -> Vec<&'static str>;

    /// Names of the outputs, in the order `compute` produces them.
    fn output_properties(&self) -> Vec<&'static str>;

    /// Descriptions of the phase's strategies, concatenated into the
    /// cache key.
    fn strategy_descriptions(&self) -> Vec<String>;

    fn cache_policy(&self) -> CachePolicy;

    async fn compute(&self, input: Self::Input) -> Result<Self::Output, PhaseError>;

    /// Phase-specific result assertions; violation is fatal.
    fn check_result(&self, result: &Self::Output) -> Result<(), PhaseError>;

    /// Identity string for logs and cache keys.
    fn description(&self) -> String {
        format!("{}({})", self.name(), self.strategy_descriptions().join(""))
    }
}

/// Executes phases against an artifact store.
#[derive(Debug, Clone)]
pub struct PhaseRunner {
    store: ArtifactStore,
}

impl PhaseRunner {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs one phase through the cache/compute/check/persist lifecycle.
    pub async fn execute<P: Phase>(
        &self,
        phase: &P,
        input: P::Input,
    ) -> Result<P::Output, PhaseError> {
        let started = Instant::now();
        let policy = phase.cache_policy();
        let path = self.store.path_for(phase.name(), &phase.description());
        info!(phase = phase.name(), inputs = ?phase.input_properties(), "phase starting");

        if policy.read_persist && tokio::fs::try_exists(&path).await? {
            let result: P::Output = self.store.load(&path).await?;
            phase.check_result(&result)?;
            info!(
                phase = phase.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "phase finished from artifact"
            );
            return Ok(result);
        }

        let result = phase.compute(input).await?;
        phase.check_result(&result)?;

        if policy.persist {
            self.store.store(&path, &result).await?;
        }
        info!(
            phase = phase.name(),
            outputs = ?phase.output_properties(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phase finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts compute invocations and can be told to produce a result
    /// that fails its own check.
    struct CountingPhase {
        policy: CachePolicy,
        computes: AtomicUsize,
        produce_invalid: bool,
    }

    impl CountingPhase {
        fn new(policy: CachePolicy) -> Self {
            Self {
                policy,
                computes: AtomicUsize::new(0),
                produce_invalid: false,
            }
        }
    }

    #[async_trait]
    impl Phase for CountingPhase {
        type Input = Vec<u32>;
        type Output = Vec<u32>;

        fn name(&self) -> &'static str {
            "CountingPhase"
        }

        fn input_properties(&self) -> Vec<&'static str> {
            vec!["values"]
        }

        fn output_properties(&self) -> Vec<&'static str> {
            vec!["doubled"]
        }

        fn strategy_descriptions(&self) -> Vec<String> {
            vec!["double".to_string()]
        }

        fn cache_policy(&self) -> CachePolicy {
            self.policy
        }

        async fn compute(&self, input: Vec<u32>) -> Result<Vec<u32>, PhaseError> {
            self.computes.fetch_add(1, Ordering::SeqCst);
            if self.produce_invalid {
                return Ok(vec![]);
            }
            Ok(input.into_iter().map(|v| v * 2).collect())
        }

        fn check_result(&self, result: &Vec<u32>) -> Result<(), PhaseError> {
            if result.is_empty() {
                return Err(PhaseError::InvariantViolation(
                    "empty result".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn second_execution_reads_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = PhaseRunner::new(ArtifactStore::new(dir.path()));
        let phase = CountingPhase::new(CachePolicy::default());

        let first = runner.execute(&phase, vec![1, 2, 3]).await.expect("first");
        let second = runner.execute(&phase, vec![4, 5, 6]).await.expect("second");

        // The second run returned the cached artifact, unconditionally
        // ignoring its own (different) input.
        assert_eq!(first, vec![2, 4, 6]);
        assert_eq!(second, first);
        assert_eq!(phase.computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idempotent_reads_with_unchanged_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = PhaseRunner::new(ArtifactStore::new(dir.path()));
        let phase = CountingPhase::new(CachePolicy::default());

        runner.execute(&phase, vec![7]).await.expect("seed");
        let a = runner.execute(&phase, vec![7]).await.expect("a");
        let b = runner.execute(&phase, vec![7]).await.expect("b");
        assert_eq!(a, b);
        assert_eq!(phase.computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_read_persist_always_computes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = PhaseRunner::new(ArtifactStore::new(dir.path()));
        let phase = CountingPhase::new(CachePolicy {
            read_persist: false,
            persist: false,
        });

        runner.execute(&phase, vec![1]).await.expect("first");
        runner.execute(&phase, vec![1]).await.expect("second");
        assert_eq!(phase.computes.load(Ordering::SeqCst), 2);
        assert!(std::fs::read_dir(dir.path()).expect("dir").next().is_none());
    }

    #[tokio::test]
    async fn failed_check_aborts_and_persists_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = PhaseRunner::new(ArtifactStore::new(dir.path()));
        let mut phase = CountingPhase::new(CachePolicy::default());
        phase.produce_invalid = true;

        let err = runner.execute(&phase, vec![1]).await.unwrap_err();
        assert!(matches!(err, PhaseError::InvariantViolation(_)));
        assert!(std::fs::read_dir(dir.path()).expect("dir").next().is_none());
    }

    #[tokio::test]
    async fn check_runs_on_cached_reads_too() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        let runner = PhaseRunner::new(store.clone());
        let phase = CountingPhase::new(CachePolicy::default());

        // Seed the cache with an artifact that violates the check.
        let path = store.path_for(phase.name(), &phase.description());
        store.store(&path, &Vec::<u32>::new()).await.expect("seed");

        let err = runner.execute(&phase, vec![1]).await.unwrap_err();
        assert!(matches!(err, PhaseError::InvariantViolation(_)));
        assert_eq!(phase.computes.load(Ordering::SeqCst), 0);
    }
}
