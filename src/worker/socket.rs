//! Socket-transport worker.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::dispatch::{read_frame, write_frame, JobEnvelope};
use crate::job::JobKind;
use crate::multiproc::MultiprocSettings;

use super::WorkerError;

/// Dials the orchestrator, serves one job per connection, reconnects.
#[derive(Debug, Clone)]
pub struct SocketWorker {
    /// Orchestrator dispatch address.
    pub server_addr: SocketAddr,
    /// Backoff between connection attempts while the orchestrator is not
    /// yet listening.
    pub retry_backoff: Duration,
    /// Local fan-out sizing for executing claimed shards.
    pub settings: MultiprocSettings,
}

impl SocketWorker {
    /// Default reconnect backoff.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(300);

    /// Serves forever: one connect/compute/respond/disconnect cycle per
    /// job. Errors are logged and the worker dials again; the process is
    /// stopped externally.
    pub async fn run(&self) {
        info!(server = %self.server_addr, "socket worker starting");
        loop {
            if let Err(e) = self.serve_once().await {
                warn!(server = %self.server_addr, error = %e, "serve cycle failed, reconnecting");
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
    }

    /// One full job cycle on a fresh connection.
    ///
    /// On failure the connection simply drops without a response; the
    /// orchestrator re-dispatches the shard to the next worker.
    pub async fn serve_once(&self) -> Result<(), WorkerError> {
        let mut stream = self.connect_with_retry().await;

        let payload = read_frame(&mut stream).await?;
        let envelope = JobEnvelope::decode(&payload)?;
        let job = JobKind::from_wire_name(&envelope.job_type)?;
        info!(%job, shard_bytes = envelope.shard.len(), "claimed dispatched job");

        let settings = self.settings;
        let result =
            tokio::task::spawn_blocking(move || job.run(settings, &envelope.shard, &envelope.params))
                .await
                .map_err(|e| WorkerError::JobPanicked(e.to_string()))??;

        write_frame(&mut stream, &result).await?;
        info!(%job, result_bytes = result.len(), "job completed, result reported");
        Ok(())
    }

    /// Retries until the orchestrator accepts; it may not be listening
    /// yet when the cluster scheduler starts workers first.
    async fn connect_with_retry(&self) -> TcpStream {
        loop {
            match TcpStream::connect(self.server_addr).await {
                Ok(stream) => return stream,
                Err(e) => {
                    debug!(server = %self.server_addr, error = %e, "connect refused, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }
}
