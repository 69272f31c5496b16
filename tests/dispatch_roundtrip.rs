//! End-to-end dispatch: live workers over both transports must agree
//! with serial processing, for any worker count.

mod common;

use std::time::Duration;

use sat_siege::dispatch::{
    FileDispatch, FileDispatchConfig, SocketDispatch, SocketDispatchConfig,
};
use sat_siege::job::{JobKind, LinkAttackProcessor};
use sat_siege::model::EdgeAttackInfo;
use sat_siege::multiproc::{
    index_samples, Multiprocessor, MultiprocSettings, ResultMap,
};
use sat_siege::worker::{FileWorker, SocketWorker};

use common::{fixture_edge_samples, fixture_link_params};

fn serial_reference() -> ResultMap<Option<EdgeAttackInfo>> {
    let samples = index_samples(fixture_edge_samples());
    Multiprocessor::new(MultiprocSettings {
        num_procs: 1,
        num_batches: 1,
    })
    .process_batches(&LinkAttackProcessor, &samples, &fixture_link_params())
}

fn worker_settings() -> MultiprocSettings {
    MultiprocSettings {
        num_procs: 2,
        num_batches: 1,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn file_dispatch_matches_serial_processing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reference = serial_reference();
    assert_eq!(reference.len(), 4);

    for num_jobs in [1usize, 2, 4] {
        let workers: Vec<_> = (0..num_jobs)
            .map(|index| {
                let worker = FileWorker {
                    index,
                    dir: dir.path().to_path_buf(),
                    poll_interval: Duration::from_millis(5),
                    settings: worker_settings(),
                };
                tokio::spawn(async move { worker.run().await })
            })
            .collect();

        let dispatch = FileDispatch::new(FileDispatchConfig {
            dir: dir.path().to_path_buf(),
            num_jobs,
            poll_interval: Duration::from_millis(10),
            shard_timeout: Duration::from_secs(10),
            max_resignals: 1,
        });
        let samples = index_samples(fixture_edge_samples());
        let merged: ResultMap<Option<EdgeAttackInfo>> = dispatch
            .dispatch(JobKind::LinkAttack, &samples, &fixture_link_params())
            .await
            .expect("dispatch");

        assert_eq!(merged, reference, "num_jobs={num_jobs}");
        for handle in workers {
            handle.abort();
        }

        // All dispatch artifacts are cleaned up on success.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn socket_dispatch_matches_serial_processing() {
    let reference = serial_reference();

    for num_jobs in [1usize, 2, 4] {
        let dispatch = SocketDispatch::bind(SocketDispatchConfig {
            bind_addr: "127.0.0.1:0".parse().expect("addr"),
            num_jobs,
            response_timeout: Duration::from_secs(10),
            max_attempts: 3,
        })
        .await
        .expect("bind");
        let addr = dispatch.local_addr().expect("addr");

        let workers: Vec<_> = (0..num_jobs)
            .map(|_| {
                let worker = SocketWorker {
                    server_addr: addr,
                    retry_backoff: Duration::from_millis(20),
                    settings: worker_settings(),
                };
                tokio::spawn(async move { worker.run().await })
            })
            .collect();

        let samples = index_samples(fixture_edge_samples());
        let merged: ResultMap<Option<EdgeAttackInfo>> = dispatch
            .dispatch(JobKind::LinkAttack, &samples, &fixture_link_params())
            .await
            .expect("dispatch");

        assert_eq!(merged, reference, "num_jobs={num_jobs}");
        for handle in workers {
            handle.abort();
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn socket_dispatch_redispatches_after_worker_failure() {
    let dispatch = SocketDispatch::bind(SocketDispatchConfig {
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        num_jobs: 2,
        response_timeout: Duration::from_secs(10),
        max_attempts: 3,
    })
    .await
    .expect("bind");
    let addr = dispatch.local_addr().expect("addr");

    // A rogue client that claims one exchange and hangs up mid-protocol.
    let rogue = tokio::spawn(async move {
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let _ = sat_siege::dispatch::read_frame(&mut stream).await;
        drop(stream);
    });

    let good_worker = {
        let worker = SocketWorker {
            server_addr: addr,
            retry_backoff: Duration::from_millis(20),
            settings: worker_settings(),
        };
        tokio::spawn(async move { worker.run().await })
    };

    let samples = index_samples(fixture_edge_samples());
    let merged: ResultMap<Option<EdgeAttackInfo>> = dispatch
        .dispatch(JobKind::LinkAttack, &samples, &fixture_link_params())
        .await
        .expect("dispatch survives the rogue worker");

    assert_eq!(merged, serial_reference());
    // Closing the listener unblocks the rogue if it was never assigned.
    drop(dispatch);
    rogue.await.expect("rogue join");
    good_worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_scenario_shards_by_stripe() {
    // Four samples [A, B, C, D] with numJobs = 2: shard 0 takes global
    // indices {0, 2}, shard 1 takes {1, 3}; the aggregate equals the
    // serial run of all four.
    let samples = index_samples(fixture_edge_samples());
    let shards = sat_siege::multiproc::stripe_shards(&samples, 2);
    assert_eq!(
        shards[0].iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(
        shards[1].iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        vec![1, 3]
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let workers: Vec<_> = (0..2)
        .map(|index| {
            let worker = FileWorker {
                index,
                dir: dir.path().to_path_buf(),
                poll_interval: Duration::from_millis(5),
                settings: worker_settings(),
            };
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    let dispatch = FileDispatch::new(FileDispatchConfig {
        dir: dir.path().to_path_buf(),
        num_jobs: 2,
        poll_interval: Duration::from_millis(10),
        shard_timeout: Duration::from_secs(10),
        max_resignals: 1,
    });
    let merged: ResultMap<Option<EdgeAttackInfo>> = dispatch
        .dispatch(JobKind::LinkAttack, &samples, &fixture_link_params())
        .await
        .expect("dispatch");

    assert_eq!(
        merged.keys().copied().collect::<Vec<_>>(),
        vec![0, 1, 2, 3],
        "every sample index exactly once"
    );
    assert_eq!(merged, serial_reference());
    for handle in workers {
        handle.abort();
    }
}
