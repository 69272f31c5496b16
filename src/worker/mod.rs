//! Long-lived remote workers.
//!
//! One worker process runs per cluster job slot, in one of two flavors
//! matching the dispatch transports. Both cycle through the same states:
//! idle, claimed (job received), computing, reporting, idle again. There
//! is no terminal state; the scheduler kills the process to stop it.

pub mod file;
pub mod socket;

use thiserror::Error;

use crate::dispatch::FrameError;
use crate::job::JobError;

pub use file::FileWorker;
pub use socket::SocketWorker;

/// Errors of one worker cycle. The run loops log these and keep serving.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("job execution failed: {0}")]
    Job(#[from] JobError),

    #[error("job task panicked: {0}")]
    JobPanicked(String),
}
