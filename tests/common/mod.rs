//! Shared fixture: a four-point grid whose west-east traffic funnels
//! through satellite 101, small enough to reason about by hand.
#![allow(dead_code)]

use sat_siege::analysis::LinkAttackParams;
use sat_siege::model::{
    AttackData, BwData, BwInfo, Edge, EdgeData, EdgeInfo, GeoPoint, GridPos, PathData, RoutedPath,
    GROUND,
};
use sat_siege::pipeline::SimulationInputs;
use sat_siege::strategy::{FeasibilityStrategy, PathFilterStrategy};

/// Ground points 1, 2 (west) and 3, 4 (east); satellites 101..103.
pub fn fixture_inputs() -> SimulationInputs {
    let mut grid = GridPos::new();
    grid.insert(1, GeoPoint { lat: 0.0, lon: 0.0 });
    grid.insert(2, GeoPoint { lat: 1.0, lon: 0.0 });
    grid.insert(3, GeoPoint { lat: 10.0, lon: 0.0 });
    grid.insert(4, GeoPoint { lat: 11.0, lon: 0.0 });

    let route = |nodes: &[i32]| RoutedPath {
        nodes: nodes.to_vec(),
        cost: nodes.len() as f64,
    };
    let mut path_data = PathData::new();
    path_data.insert((1, 3), vec![route(&[1, 101, 102, 3])]);
    path_data.insert((1, 4), vec![route(&[1, 101, 103, 4])]);
    path_data.insert((2, 3), vec![route(&[2, 101, 102, 3])]);
    path_data.insert((2, 4), vec![route(&[2, 101, 103, 4])]);

    let mut edge_data = EdgeData::new();
    edge_data.insert(
        (101, 102),
        EdgeInfo {
            paths_through: vec![(1, 3, 0), (2, 3, 0)],
        },
    );
    edge_data.insert(
        (101, 103),
        EdgeInfo {
            paths_through: vec![(1, 4, 0), (2, 4, 0)],
        },
    );
    for ed in [(102, 101), (103, 101)] {
        edge_data.insert(ed, EdgeInfo::default());
    }
    for sat in [101, 102, 103] {
        edge_data.insert((GROUND, sat), EdgeInfo::default());
        edge_data.insert((sat, GROUND), EdgeInfo::default());
    }

    SimulationInputs {
        grid,
        path_data,
        edge_data,
    }
}

/// Link-attack parameters over the fixture network with idle bandwidth
/// left on both funnels.
pub fn fixture_link_params() -> LinkAttackParams {
    let inputs = fixture_inputs();
    let mut bw_data = BwData::new();
    for ed in [(101, 102), (102, 101), (101, 103), (103, 101)] {
        bw_data.insert(ed, BwInfo { idle_bw: 2.0, capacity: 10.0 });
    }
    for sat in [101, 102, 103] {
        bw_data.insert((GROUND, sat), BwInfo::idle(5.0));
        bw_data.insert((sat, GROUND), BwInfo::idle(5.0));
    }

    LinkAttackParams {
        filter_strat: PathFilterStrategy::AllowedSourcesOnly,
        feas_strat: FeasibilityStrategy::CapacityGreedy,
        path_data: inputs.path_data,
        edge_data: inputs.edge_data,
        bw_data,
        allowed_sources: [1, 2, 3, 4].into_iter().collect(),
    }
}

/// The four edge samples dispatched in the end-to-end scenarios.
pub fn fixture_edge_samples() -> Vec<Edge> {
    vec![(101, 102), (101, 103), (102, 101), (103, 101)]
}

/// Single-link attack data matching the fixture, for zone-phase tests.
pub fn fixture_attack_data() -> AttackData {
    use sat_siege::analysis::analyze_single_edge;
    let params = fixture_link_params();
    fixture_edge_samples()
        .into_iter()
        .map(|ed| (ed, analyze_single_edge(ed, &params)))
        .collect()
}
