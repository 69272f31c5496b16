//! Attack-side strategies: source constraints, path filtering, bottleneck
//! selection and feasibility checking.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::analysis::{find_pairs_through_edge, CoverageMap};
use crate::model::{
    AttackData, AttackFlow, BwData, Edge, EdgeData, FeasibilityOutcome, GridPos, NodeId, PathData,
};

/// Permitted attack-source grid points per bottleneck edge.
pub type DirectionData = HashMap<Edge, BTreeSet<NodeId>>;

/// Restricts where attack traffic may originate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoConstraintStrategy {
    /// Any grid point may source attack traffic.
    AllowAll,
    /// Only grid points within the latitude band (inclusive).
    LatitudeBand { min_lat: f64, max_lat: f64 },
}

impl GeoConstraintStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::AllowAll => "geo_all".to_string(),
            Self::LatitudeBand { min_lat, max_lat } => format!("geo_lat{min_lat}to{max_lat}"),
        }
    }

    /// Returns the permitted attack-source grid points.
    pub fn compute(&self, grid: &GridPos) -> BTreeSet<NodeId> {
        match self {
            Self::AllowAll => grid.keys().copied().collect(),
            Self::LatitudeBand { min_lat, max_lat } => grid
                .iter()
                .filter(|(_, pos)| pos.lat >= *min_lat && pos.lat <= *max_lat)
                .map(|(id, _)| *id)
                .collect(),
        }
    }
}

/// Derives the permitted source directions for each bottleneck edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathFilterStrategy {
    /// Sources of paths routed through the edge, intersected with the
    /// geographic allow-list.
    AllowedSourcesOnly,
}

impl PathFilterStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::AllowedSourcesOnly => "filt_allowed".to_string(),
        }
    }

    pub fn compute(
        &self,
        bneck: &[Edge],
        edge_data: &EdgeData,
        path_data: &PathData,
        allowed_sources: &BTreeSet<NodeId>,
    ) -> DirectionData {
        match self {
            Self::AllowedSourcesOnly => {
                let mut directions = DirectionData::new();
                for &ed in bneck {
                    let sources: BTreeSet<NodeId> =
                        find_pairs_through_edge(ed, edge_data, path_data)
                            .into_iter()
                            .map(|(src, _)| src)
                            .filter(|src| allowed_sources.contains(src))
                            .collect();
                    directions.insert(ed, sources);
                }
                directions
            }
        }
    }
}

/// Proposes candidate bottleneck edge-sets covering all cross-zone paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BottleneckStrategy {
    /// Greedy set cover, diversified by seeding each candidate with a
    /// different high-coverage edge.
    GreedyCover {
        /// Upper bound on proposed candidates.
        max_candidates: usize,
        /// Upper bound on edges per candidate.
        max_edges: usize,
    },
}

impl BottleneckStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::GreedyCover {
                max_candidates,
                max_edges,
            } => format!("bnck_greedy{max_candidates}x{max_edges}"),
        }
    }

    /// Proposes candidate edge-sets. Every returned candidate covers all
    /// `n_paths` cross-zone paths.
    pub fn compute(
        &self,
        _bw_data: &BwData,
        _atk_data: &AttackData,
        coverage: &CoverageMap,
        n_paths: usize,
    ) -> Vec<Vec<Edge>> {
        match self {
            Self::GreedyCover {
                max_candidates,
                max_edges,
            } => {
                // Deterministic edge order: coverage size descending, then id.
                let mut seeds: Vec<Edge> = coverage.keys().copied().collect();
                seeds.sort_by(|a, b| {
                    let ca = coverage[a].len();
                    let cb = coverage[b].len();
                    cb.cmp(&ca).then(a.cmp(b))
                });

                let mut candidates: Vec<Vec<Edge>> = Vec::new();
                let mut seen: BTreeSet<Vec<Edge>> = BTreeSet::new();
                for &seed in seeds.iter().take(*max_candidates) {
                    if let Some(cand) = greedy_cover_from(seed, coverage, n_paths, *max_edges) {
                        let mut key = cand.clone();
                        key.sort();
                        if seen.insert(key) {
                            candidates.push(cand);
                        }
                    }
                    if candidates.len() >= *max_candidates {
                        break;
                    }
                }
                candidates
            }
        }
    }
}

/// Greedy completion of a cover starting from `seed`. Returns `None` when
/// the cover cannot be completed within `max_edges`.
fn greedy_cover_from(
    seed: Edge,
    coverage: &CoverageMap,
    n_paths: usize,
    max_edges: usize,
) -> Option<Vec<Edge>> {
    let mut chosen = vec![seed];
    let mut covered: BTreeSet<usize> = coverage[&seed].clone();

    let mut ordered: Vec<Edge> = coverage.keys().copied().collect();
    ordered.sort();

    while covered.len() < n_paths {
        if chosen.len() >= max_edges {
            return None;
        }
        let mut best: Option<(usize, Edge)> = None;
        for &ed in &ordered {
            if chosen.contains(&ed) {
                continue;
            }
            let gain = coverage[&ed].difference(&covered).count();
            if gain == 0 {
                continue;
            }
            match best {
                Some((g, e)) if (gain, std::cmp::Reverse(ed)) <= (g, std::cmp::Reverse(e)) => {}
                _ => best = Some((gain, ed)),
            }
        }
        let (_, ed) = best?;
        covered.extend(coverage[&ed].iter().copied());
        chosen.push(ed);
    }
    Some(chosen)
}

/// Decides whether a candidate can actually be saturated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeasibilityStrategy {
    /// Greedy assignment of permitted sources to bottleneck edges, each
    /// source bounded by the uplink size. A stand-in for an LP solve with
    /// the same accept/reject contract.
    CapacityGreedy,
}

impl FeasibilityStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::CapacityGreedy => "feas_greedy".to_string(),
        }
    }

    /// Returns a flow assignment saturating every edge of `bneck`, or
    /// `None` when no assignment fits the source/uplink constraints.
    pub fn compute(
        &self,
        bneck: &[Edge],
        _path_data: &PathData,
        bw_data: &BwData,
        direction_data: &DirectionData,
        uplink_size: f64,
    ) -> Option<FeasibilityOutcome> {
        match self {
            Self::CapacityGreedy => {
                capacity_greedy(bneck, bw_data, direction_data, uplink_size)
            }
        }
    }
}

fn capacity_greedy(
    bneck: &[Edge],
    bw_data: &BwData,
    direction_data: &DirectionData,
    uplink_size: f64,
) -> Option<FeasibilityOutcome> {
    if uplink_size <= 0.0 && !bneck.is_empty() {
        return None;
    }

    // Saturate the tightest edges first so shared sources are not wasted.
    let mut edges: Vec<Edge> = bneck.to_vec();
    edges.sort_by(|a, b| {
        let ia = bw_data.get(a).map(|i| i.idle_bw).unwrap_or(0.0);
        let ib = bw_data.get(b).map(|i| i.idle_bw).unwrap_or(0.0);
        ib.partial_cmp(&ia).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(b))
    });

    let mut source_budget: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut flows: Vec<AttackFlow> = Vec::new();
    let mut on_target = 0.0;

    for ed in edges {
        let mut need = bw_data.get(&ed).map(|i| i.idle_bw).unwrap_or(0.0);
        if need <= 0.0 {
            continue;
        }
        let Some(sources) = direction_data.get(&ed) else {
            return None;
        };
        for &src in sources {
            if need <= 0.0 {
                break;
            }
            let budget = source_budget.entry(src).or_insert(uplink_size);
            if *budget <= 0.0 {
                continue;
            }
            let bw = need.min(*budget);
            *budget -= bw;
            need -= bw;
            on_target += bw;
            flows.push(AttackFlow { source: src, edge: ed, bw });
        }
        if need > 0.0 {
            return None;
        }
    }

    let total_budget = source_budget.len() as f64 * uplink_size;
    let detection_risk = if total_budget > 0.0 {
        on_target / total_budget
    } else {
        0.0
    };
    Some(FeasibilityOutcome {
        flows,
        on_target_bw: on_target,
        detection_risk,
    })
}
