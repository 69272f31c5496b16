//! Attack-feasibility analysis payloads.
//!
//! Pure per-sample algorithms, free of any engine concern: the
//! zone-bottleneck disconnection analysis and the single-link attack
//! analysis it builds on. The engine adapters in [`crate::job`] feed these
//! from shards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{
    ordered_pair, path_edges, reverse_edge, uplink_capacity, AttackData, BwData, Edge,
    EdgeAttackInfo, EdgeData, NodeId, Path, PathData, ZoneBottleneckInfo, ZonePair, GROUND,
};
use crate::strategy::{
    BottleneckStrategy, EdgeAdmissionStrategy, FeasibilityStrategy, PathFilterStrategy,
};

/// Admissible-edge -> covered-cross-zone-path-indices map.
pub type CoverageMap = HashMap<Edge, BTreeSet<usize>>;

/// Shared read-only parameters of the zone-bottleneck payload.
///
/// Copied to every shard; workers never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneBottleneckParams {
    pub edges_strat: EdgeAdmissionStrategy,
    pub bneck_strat: BottleneckStrategy,
    pub filter_strat: PathFilterStrategy,
    pub feas_strat: FeasibilityStrategy,
    pub path_data: PathData,
    pub edge_data: EdgeData,
    pub bw_data: BwData,
    pub atk_data: AttackData,
    pub allowed_sources: BTreeSet<NodeId>,
}

/// Shared read-only parameters of the single-link attack payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAttackParams {
    pub filter_strat: PathFilterStrategy,
    pub feas_strat: FeasibilityStrategy,
    pub path_data: PathData,
    pub edge_data: EdgeData,
    pub bw_data: BwData,
    pub allowed_sources: BTreeSet<NodeId>,
}

/// Per-sample outcome of the zone-bottleneck analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneOutcome {
    /// The zones overlap; the sample is dropped from the result map.
    Excluded,
    /// Analyzed but not attackable: coverage gap or no feasible candidate.
    /// Recorded as `None` in the result map.
    Rejected,
    /// A feasible attack exists.
    Feasible(ZoneBottleneckInfo),
}

/// Analyzes one zone pair for a feasible disconnection attack.
pub fn analyze_zone_pair(pair: &ZonePair, params: &ZoneBottleneckParams) -> ZoneOutcome {
    // An isl-only disconnection of overlapping zones is impossible; the
    // sample pair itself is bad.
    if pair.overlaps() {
        return ZoneOutcome::Excluded;
    }

    let cross = cross_zone_paths(&pair.zone1, &pair.zone2, &params.path_data);
    if cross.is_empty() {
        // Nothing to cut: vacuously covered.
        return ZoneOutcome::Feasible(ZoneBottleneckInfo {
            bottlenecks: Vec::new(),
            cross_zone_paths: Vec::new(),
            grid_histogram: BTreeMap::new(),
        });
    }

    let (coverage, covered) = coverage_map(&cross, params.edges_strat, &params.atk_data);
    if coverage.is_empty() || covered.len() < cross.len() {
        return ZoneOutcome::Rejected;
    }

    let uplink_size = uplink_capacity(&params.bw_data);
    let candidates =
        params
            .bneck_strat
            .compute(&params.bw_data, &params.atk_data, &coverage, cross.len());

    let mut accepted = 0usize;
    let mut histogram: BTreeMap<NodeId, u32> = BTreeMap::new();
    for cand in &candidates {
        let directions = params.filter_strat.compute(
            cand,
            &params.edge_data,
            &params.path_data,
            &params.allowed_sources,
        );
        if params
            .feas_strat
            .compute(cand, &params.path_data, &params.bw_data, &directions, uplink_size)
            .is_none()
        {
            continue;
        }
        accepted += 1;
        for &bedge in cand {
            let unique_sources: BTreeSet<NodeId> =
                find_pairs_through_edge(bedge, &params.edge_data, &params.path_data)
                    .into_iter()
                    .map(|(src, _)| src)
                    .collect();
            for src in unique_sources {
                *histogram.entry(src).or_insert(0) += 1;
            }
        }
    }

    if accepted == 0 {
        return ZoneOutcome::Rejected;
    }
    ZoneOutcome::Feasible(ZoneBottleneckInfo {
        bottlenecks: candidates,
        cross_zone_paths: cross,
        grid_histogram: histogram,
    })
}

/// Analyzes whether one edge can be saturated on its own.
pub fn analyze_single_edge(edge: Edge, params: &LinkAttackParams) -> Option<EdgeAttackInfo> {
    let bneck = [edge];
    let directions = params.filter_strat.compute(
        &bneck,
        &params.edge_data,
        &params.path_data,
        &params.allowed_sources,
    );
    let uplink_size = uplink_capacity(&params.bw_data);
    params
        .feas_strat
        .compute(&bneck, &params.path_data, &params.bw_data, &directions, uplink_size)
        .map(|outcome| EdgeAttackInfo {
            attack_bw: outcome.on_target_bw,
            n_flows: outcome.flows.len() as u32,
            detection_risk: outcome.detection_risk,
        })
}

/// All distinct canonical paths crossing from `zone1` to `zone2`.
///
/// Every stored path between a `(src, trg)` pair is stripped of its
/// endpoints, reversed when the pair was looked up against its stored
/// orientation, and wrapped in ground sentinels, so that identical
/// satellite segments between different grid-point pairs compare equal.
/// The collected list is sorted and deduplicated by adjacent equality.
pub fn cross_zone_paths(zone1: &[NodeId], zone2: &[NodeId], path_data: &PathData) -> Vec<Path> {
    let mut paths_across: Vec<Path> = Vec::new();
    for &src in zone1 {
        for &trg in zone2 {
            let (key, in_order) = ordered_pair((src, trg));
            let Some(routes) = path_data.get(&key) else {
                continue;
            };
            for route in routes {
                if route.nodes.len() < 2 {
                    continue;
                }
                let inner = &route.nodes[1..route.nodes.len() - 1];
                let mut canonical: Path = Vec::with_capacity(inner.len() + 2);
                canonical.push(GROUND);
                if in_order {
                    canonical.extend_from_slice(inner);
                } else {
                    canonical.extend(inner.iter().rev());
                }
                canonical.push(GROUND);
                paths_across.push(canonical);
            }
        }
    }
    paths_across.sort();
    paths_across.dedup();
    paths_across
}

/// Builds the admissible-edge coverage map over the cross-zone paths.
///
/// An edge participates only when the admission strategy accepts it and it
/// has single-link attack data; absence from `atk_data` counts as not
/// attackable. Returns the map plus the union of covered path indices.
pub fn coverage_map(
    cross_zone_paths: &[Path],
    edges_strat: EdgeAdmissionStrategy,
    atk_data: &AttackData,
) -> (CoverageMap, BTreeSet<usize>) {
    let mut coverage = CoverageMap::new();
    let mut covered: BTreeSet<usize> = BTreeSet::new();
    for (d_idx, path) in cross_zone_paths.iter().enumerate() {
        for ed in path_edges(path) {
            let attackable = matches!(atk_data.get(&ed), Some(Some(_)));
            if edges_strat.admits(ed) && attackable {
                covered.insert(d_idx);
                coverage.entry(ed).or_default().insert(d_idx);
            }
        }
    }
    (coverage, covered)
}

/// Source/target grid-point pairs of all paths routed through an edge, in
/// either orientation.
///
/// Pairs from the reversed edge's list are flipped so the returned pair is
/// always oriented with the traversal direction of `edge`.
pub fn find_pairs_through_edge(
    edge: Edge,
    edge_data: &EdgeData,
    _path_data: &PathData,
) -> Vec<(NodeId, NodeId)> {
    let mut pairs = Vec::new();
    if let Some(info) = edge_data.get(&edge) {
        for &(src, trg, _) in &info.paths_through {
            pairs.push((src, trg));
        }
    }
    if let Some(info) = edge_data.get(&reverse_edge(edge)) {
        for &(src, trg, _) in &info.paths_through {
            pairs.push((trg, src));
        }
    }
    pairs
}
