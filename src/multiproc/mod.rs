//! Local batch-parallel fan-out.
//!
//! The multiprocessor partitions an in-memory sample set across a fixed
//! pool of OS threads and merges the per-thread result maps. Partial
//! maps come back over the thread join, never through shared mutable
//! state.
//!
//! Samples carry their global index through partitioning, so shard
//! results merge by disjoint key regardless of shard completion order.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result map from global sample index to per-sample result.
///
/// Ordered, so aggregation output is deterministic for any shard count.
pub type ResultMap<R> = BTreeMap<usize, R>;

/// A sample tagged with its global index.
pub type IndexedSample<S> = (usize, S);

/// Per-sample processing hook.
///
/// One processor exists per job type. It may insert a result under the
/// sample's global index, insert an explicit "analyzed but negative"
/// value, or insert nothing at all to exclude the sample.
pub trait SampleProcessor: Send + Sync {
    type Sample: Clone + Send + Sync;
    type Params: Send + Sync;
    type Output: Send;

    fn process_sample(
        &self,
        index: usize,
        sample: &Self::Sample,
        params: &Self::Params,
        out: &mut ResultMap<Self::Output>,
    );
}

/// Pool sizing for local fan-out. Serialized into worker configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiprocSettings {
    /// Worker threads per batch.
    pub num_procs: usize,
    /// Consecutive batches the sample set is split into; bounds peak
    /// memory of in-flight per-thread state.
    pub num_batches: usize,
}

impl Default for MultiprocSettings {
    fn default() -> Self {
        Self {
            num_procs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            num_batches: 1,
        }
    }
}

/// Tags each sample with its position in the input order.
pub fn index_samples<S>(samples: Vec<S>) -> Vec<IndexedSample<S>> {
    samples.into_iter().enumerate().collect()
}

/// Stripes `items` into `num_shards` shards: shard `i` receives the items
/// at positions `i, i + num_shards, i + 2 * num_shards, …`.
pub fn stripe_shards<T: Clone>(items: &[T], num_shards: usize) -> Vec<Vec<T>> {
    let num_shards = num_shards.max(1);
    let mut shards: Vec<Vec<T>> = vec![Vec::new(); num_shards];
    for (pos, item) in items.iter().enumerate() {
        shards[pos % num_shards].push(item.clone());
    }
    shards
}

/// Fixed-size local thread pool executing a [`SampleProcessor`] over a
/// sample set.
#[derive(Debug, Clone, Copy)]
pub struct Multiprocessor {
    settings: MultiprocSettings,
}

impl Multiprocessor {
    pub fn new(settings: MultiprocSettings) -> Self {
        Self { settings }
    }

    /// Processes all samples and returns the merged result map.
    ///
    /// Samples are split into consecutive batches, each batch striped
    /// across the thread pool. A panicking sample is logged and skipped;
    /// the rest of its shard survives.
    pub fn process_batches<P: SampleProcessor>(
        &self,
        processor: &P,
        samples: &[IndexedSample<P::Sample>],
        params: &P::Params,
    ) -> ResultMap<P::Output> {
        let num_batches = self.settings.num_batches.max(1);
        let batch_size = samples.len().div_ceil(num_batches).max(1);

        let mut merged = ResultMap::new();
        for batch in samples.chunks(batch_size) {
            let shards = stripe_shards(batch, self.settings.num_procs);
            let partials = std::thread::scope(|scope| {
                let handles: Vec<_> = shards
                    .iter()
                    .filter(|shard| !shard.is_empty())
                    .map(|shard| scope.spawn(move || run_shard(processor, shard, params)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("shard worker thread panicked"))
                    .collect::<Vec<_>>()
            });
            for partial in partials {
                // Shard index sets are disjoint by construction.
                debug_assert!(partial.keys().all(|k| !merged.contains_key(k)));
                merged.extend(partial);
            }
        }
        debug!(samples = samples.len(), results = merged.len(), "batch processing merged");
        merged
    }
}

/// Runs one shard sequentially, isolating per-sample panics.
fn run_shard<P: SampleProcessor>(
    processor: &P,
    shard: &[IndexedSample<P::Sample>],
    params: &P::Params,
) -> ResultMap<P::Output> {
    let mut out = ResultMap::new();
    for (index, sample) in shard {
        let attempt = catch_unwind(AssertUnwindSafe(|| {
            processor.process_sample(*index, sample, params, &mut out);
        }));
        if attempt.is_err() {
            // The failing sample is dropped; its absence is visible to the
            // caller, everything else in the shard is kept.
            warn!(index, "sample processing panicked, skipping sample");
            out.remove(index);
        }
    }
    out
}
