//! Length-prefixed wire framing.
//!
//! Both directions of the socket transport carry frames: a 4-byte
//! big-endian length followed by exactly that many payload bytes. The
//! reader uses `read_exact`, so a payload delivered in arbitrarily small
//! chunks is reassembled byte-for-byte before any deserialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame's payload. Shards of path tables are
/// large; anything beyond this indicates a corrupt length prefix.
pub const MAX_FRAME_LEN: u32 = 1 << 30;

/// Errors of frame encoding and decoding.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame length {len} exceeds maximum {max}")]
    Oversize { len: u32, max: u32 },

    #[error("failed to encode envelope: {0}")]
    EncodeEnvelope(#[source] bincode::Error),

    #[error("failed to decode envelope: {0}")]
    DecodeEnvelope(#[source] bincode::Error),
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::Oversize {
        len: u32::MAX,
        max: MAX_FRAME_LEN,
    })?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversize {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame, waiting for the full payload.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversize {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Orchestrator-to-worker payload: the job's wire name plus the opaque
/// serialized shard and parameter bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_type: String,
    pub shard: Vec<u8>,
    pub params: Vec<u8>,
}

impl JobEnvelope {
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        bincode::serialize(self).map_err(FrameError::EncodeEnvelope)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        bincode::deserialize(bytes).map_err(FrameError::DecodeEnvelope)
    }
}
