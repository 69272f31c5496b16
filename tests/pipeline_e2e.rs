//! Full pipeline runs over the fixture constellation.

mod common;

use sat_siege::config::EngineConfig;
use sat_siege::dispatch::ExecutionMode;
use sat_siege::model::check_bandwidth_invariant;
use sat_siege::multiproc::MultiprocSettings;
use sat_siege::pipeline::SimulationPipeline;
use sat_siege::strategy::{
    TrafficAssignStrategy, TrafficSelectStrategy, ZoneBuildStrategy, ZoneSelectStrategy,
};

use common::fixture_inputs;

fn fixture_config(cache_dir: &std::path::Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cache_dir = cache_dir.to_path_buf();
    config.execution = ExecutionMode::Local {
        settings: MultiprocSettings {
            num_procs: 2,
            num_batches: 1,
        },
    };
    config.traffic.select = TrafficSelectStrategy::RandomPairs {
        demands: 4,
        amount: 1.0,
        seed: 11,
    };
    config.traffic.assign = TrafficAssignStrategy::BidirectionalFit {
        isl_capacity: 10.0,
        uplink_capacity: 10.0,
        utilisation: 1.0,
    };
    // Zones of two points around the far corners: {1, 2} vs {4, 3}.
    config.zone_attack.select = ZoneSelectStrategy::FixedPairs { pairs: vec![(1, 4)] };
    config.zone_attack.build = ZoneBuildStrategy::KNearest { zone_size: 2 };
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_finds_the_funnel_bottleneck() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = fixture_config(dir.path());
    let pipeline = SimulationPipeline::from_config(&config);

    let (outputs, report) = pipeline.run(fixture_inputs()).await.expect("run");

    check_bandwidth_invariant(&outputs.bw_data).expect("bandwidth invariant");
    assert!(
        outputs.atk_data.values().any(|info| info.is_some()),
        "some edge must be singularly attackable"
    );

    let record = outputs.zone_attacks.get(&0).expect("zone sample present");
    assert_eq!(record.pair.zone1, vec![1, 2]);
    assert_eq!(record.pair.zone2, vec![4, 3]);
    let info = record.outcome.as_ref().expect("feasible disconnection");
    assert_eq!(info.cross_zone_paths.len(), 2);
    assert!(!info.bottlenecks.is_empty());
    assert!(info.grid_histogram.keys().all(|id| (1..=4).contains(id)));

    assert_eq!(report.feasible_zone_attacks, 1);
    assert_eq!(report.rejected_zone_attacks, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_second_run_reproduces_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = fixture_config(dir.path());
    let pipeline = SimulationPipeline::from_config(&config);

    let (first, _) = pipeline.run(fixture_inputs()).await.expect("first run");
    let artifacts_after_first: Vec<_> = std::fs::read_dir(dir.path())
        .expect("dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(artifacts_after_first.len(), 3, "one artifact per phase");

    let (second, _) = pipeline.run(fixture_inputs()).await.expect("second run");
    assert_eq!(first.bw_data, second.bw_data);
    assert_eq!(first.atk_data, second.atk_data);
    assert_eq!(first.zone_attacks, second.zone_attacks);
}
