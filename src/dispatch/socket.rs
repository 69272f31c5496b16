//! TCP dispatch transport.
//!
//! The orchestrator listens; workers dial in. Each accepted connection is
//! handed the next pending shard as a framed `(jobType, shard, params)`
//! envelope and must answer with one framed result map. Handlers deliver
//! `(shard index, outcome)` over an mpsc channel; the orchestrator never
//! shares mutable aggregation state with them.
//!
//! Every exchange runs under a response deadline. A shard whose handler
//! times out or errors goes back in the pending queue and is re-dispatched
//! to the next inbound connection — workers reconnect for every job, so
//! the retry lands on a live one. A bounded attempt count per shard turns
//! persistent failure into an error instead of an infinite wait.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::job::JobKind;
use crate::multiproc::{IndexedSample, ResultMap};

use super::frame::{read_frame, write_frame, JobEnvelope};
use super::{encode_shards, merge_shard_maps, DispatchError};

/// Configuration of the socket transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketDispatchConfig {
    /// Address the orchestrator listens on.
    pub bind_addr: SocketAddr,
    /// Worker slots; one shard per slot.
    pub num_jobs: usize,
    /// Deadline for one send-envelope/receive-result exchange.
    pub response_timeout: Duration,
    /// Total dispatch attempts allowed per shard.
    pub max_attempts: u32,
}

impl Default for SocketDispatchConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:40900".parse().expect("valid literal address"),
            num_jobs: 40,
            response_timeout: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}

/// What a handler reports back for its shard.
#[derive(Debug)]
struct HandlerEvent {
    shard: usize,
    outcome: Result<Vec<u8>, String>,
}

/// Orchestrator side of the socket transport.
#[derive(Debug)]
pub struct SocketDispatch {
    config: SocketDispatchConfig,
    listener: TcpListener,
}

impl SocketDispatch {
    /// Binds the listening socket. Workers may start dialing as soon as
    /// this returns; they retry until [`dispatch`](Self::dispatch) begins
    /// accepting.
    pub async fn bind(config: SocketDispatchConfig) -> Result<Self, DispatchError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "socket dispatch listening");
        Ok(Self { config, listener })
    }

    /// The actually bound address (relevant when configured with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, DispatchError> {
        Ok(self.listener.local_addr()?)
    }

    /// Dispatches striped shards over inbound connections and aggregates
    /// the framed results.
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
        info!(%run_id, %job, samples = samples.len(), num_jobs, "socket dispatch starting");

        let params_bytes = bincode::serialize(params).map_err(DispatchError::Encode)?;
        let envelopes: Vec<Vec<u8>> = encode_shards(samples, num_jobs)?
            .into_iter()
            .map(|shard| {
                JobEnvelope {
                    job_type: job.wire_name().to_string(),
                    shard,
                    params: params_bytes.clone(),
                }
                .encode()
                .map_err(DispatchError::from)
            })
            .collect::<Result<_, _>>()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<HandlerEvent>();
        let mut pending: VecDeque<usize> = (0..num_jobs).collect();
        let mut attempts = vec![0u32; num_jobs];
        let mut shard_maps: Vec<Option<ResultMap<R>>> = (0..num_jobs).map(|_| None).collect();
        let mut completed = 0usize;

        while completed < num_jobs {
            let event = if pending.is_empty() {
                rx.recv().await.ok_or(DispatchError::ChannelClosed)?
            } else {
                tokio::select! {
                    accepted = self.listener.accept() => {
                        let (stream, peer) = accepted?;
                        let shard = pending.pop_front().expect("pending not empty");
                        attempts[shard] += 1;
                        debug!(shard, %peer, attempt = attempts[shard], "assigning shard to connection");
                        tokio::spawn(handle_exchange(
                            stream,
                            shard,
                            envelopes[shard].clone(),
                            self.config.response_timeout,
                            tx.clone(),
                        ));
                        continue;
                    }
                    event = rx.recv() => event.ok_or(DispatchError::ChannelClosed)?,
                }
            };

            let shard = event.shard;
            if shard_maps[shard].is_some() {
                // A retry already completed this shard; drop the straggler.
                debug!(shard, "ignoring duplicate shard completion");
                continue;
            }
            match event.outcome {
                Ok(bytes) => {
                    let map: ResultMap<R> =
                        bincode::deserialize(&bytes).map_err(DispatchError::Decode)?;
                    shard_maps[shard] = Some(map);
                    completed += 1;
                }
                Err(reason) => {
                    if attempts[shard] >= self.config.max_attempts {
                        return Err(DispatchError::ShardFailed {
                            shard,
                            attempts: attempts[shard],
                            reason,
                        });
                    }
                    warn!(shard, attempt = attempts[shard], %reason, "shard exchange failed, re-queueing");
                    pending.push_back(shard);
                }
            }
        }

        let merged = merge_shard_maps(shard_maps.into_iter().flatten())?;
        info!(%run_id, results = merged.len(), "socket dispatch aggregated");
        Ok(merged)
    }
}

/// One send/receive exchange with a connected worker.
async fn handle_exchange(
    mut stream: TcpStream,
    shard: usize,
    envelope: Vec<u8>,
    deadline: Duration,
    tx: mpsc::UnboundedSender<HandlerEvent>,
) {
    let exchange = async {
        write_frame(&mut stream, &envelope).await?;
        read_frame(&mut stream).await
    };
    let outcome = match tokio::time::timeout(deadline, exchange).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("no response within {deadline:?}")),
    };
    // The dispatcher may already be gone after a fatal error; nothing to
    // do about an unreceived event.
    let _ = tx.send(HandlerEvent { shard, outcome });
}
