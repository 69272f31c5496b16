//! Phase cache artifacts.
//!
//! One artifact per phase, gzip-compressed bincode, written atomically.
//! The artifact name embeds a digest of the phase's strategy description,
//! so a cached result computed under different strategy parameters is a
//! cache miss rather than a silently stale hit.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::util::{short_digest, write_atomic};

/// Errors of artifact reads and writes.
///
/// A malformed artifact on a required read is fatal to the run; there is
/// no silent recompute.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode artifact {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("artifact task failed: {0}")]
    TaskJoin(String),
}

/// Filesystem store for phase result artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a phase, keyed by name and strategy description.
    pub fn path_for(&self, phase_name: &str, description: &str) -> PathBuf {
        self.dir
            .join(format!("{phase_name}-{}.res.gz", short_digest(description)))
    }

    /// Reads and decodes an artifact.
    pub async fn load<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &Path,
    ) -> Result<T, CacheError> {
        let bytes = tokio::fs::read(path).await?;
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            bincode::deserialize(&raw).map_err(|source| CacheError::Decode { path, source })
        })
        .await
        .map_err(|e| CacheError::TaskJoin(e.to_string()))?
    }

    /// Encodes and atomically writes an artifact.
    pub async fn store<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let raw = bincode::serialize(value).map_err(|source| CacheError::Encode {
            path: path.to_owned(),
            source,
        })?;
        let compressed = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            encoder.finish()
        })
        .await
        .map_err(|e| CacheError::TaskJoin(e.to_string()))??;
        write_atomic(path, compressed).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        let path = store.path_for("TrafficPhase", "tsel_rand4s1tasg_bidi");

        let mut value: BTreeMap<usize, Vec<i32>> = BTreeMap::new();
        value.insert(0, vec![1, 2, 3]);
        value.insert(7, vec![]);
        store.store(&path, &value).await.expect("store");

        let loaded: BTreeMap<usize, Vec<i32>> = store.load(&path).await.expect("load");
        assert_eq!(loaded, value);
    }

    #[tokio::test]
    async fn repeated_loads_are_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        let path = store.path_for("EdgePhase", "desc");
        store.store(&path, &vec![9u64, 8, 7]).await.expect("store");

        let first = tokio::fs::read(&path).await.expect("read bytes");
        let a: Vec<u64> = store.load(&path).await.expect("load a");
        let b: Vec<u64> = store.load(&path).await.expect("load b");
        let second = tokio::fs::read(&path).await.expect("read bytes again");
        assert_eq!(a, b);
        assert_eq!(first, second, "loading must not rewrite the artifact");
    }

    #[tokio::test]
    async fn corrupt_artifact_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        let path = store.path_for("TrafficPhase", "desc");

        // Valid gzip wrapping garbage bincode.
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"\xff\xff\xff\xff\xff").expect("write");
        let bytes = encoder.finish().expect("finish");
        tokio::fs::create_dir_all(dir.path()).await.expect("dir");
        tokio::fs::write(&path, bytes).await.expect("write");

        let err = store.load::<Vec<String>>(&path).await.unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn path_varies_with_description() {
        let store = ArtifactStore::new("cache");
        let a = store.path_for("ZoneBottlePhase", "zsel_rand8s7");
        let b = store.path_for("ZoneBottlePhase", "zsel_rand8s8");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".res.gz"));
    }
}
