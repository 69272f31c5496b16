//! Traffic demand selection and bandwidth assignment.

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::{
    ordered_pair, path_edges, reverse_edge, BwData, BwInfo, EdgeData, NodeId, PathData, GROUND,
};

/// One unit of communication demand between two grid points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficDemand {
    /// Ordered pair key into the path tables.
    pub src: NodeId,
    pub trg: NodeId,
    /// Which stored path of the pair carries the demand.
    pub path_idx: usize,
    /// Bandwidth amount of the demand.
    pub amount: f64,
}

/// Chooses the demand set to place on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrafficSelectStrategy {
    /// Seeded uniform draws over the pairs that have stored paths.
    RandomPairs {
        demands: usize,
        amount: f64,
        seed: u64,
    },
}

impl TrafficSelectStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::RandomPairs { demands, amount, seed } => {
                format!("tsel_rand{demands}a{amount}s{seed}")
            }
        }
    }

    pub fn compute(&self, path_data: &PathData) -> Vec<TrafficDemand> {
        match self {
            Self::RandomPairs { demands, amount, seed } => {
                let mut keys: Vec<(NodeId, NodeId)> = path_data
                    .iter()
                    .filter(|(_, routes)| !routes.is_empty())
                    .map(|(k, _)| *k)
                    .collect();
                keys.sort();
                if keys.is_empty() {
                    return Vec::new();
                }
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                (0..*demands)
                    .map(|_| {
                        let (src, trg) = keys[rng.random_range(0..keys.len())];
                        TrafficDemand {
                            src,
                            trg,
                            path_idx: 0,
                            amount: *amount,
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Places demands onto edge bandwidth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrafficAssignStrategy {
    /// Bidirectional first-fit: a demand is admitted only when every edge
    /// of its canonical path keeps its used bandwidth within the
    /// utilisation bound, and an admitted demand consumes bandwidth in
    /// both edge directions.
    BidirectionalFit {
        isl_capacity: f64,
        uplink_capacity: f64,
        utilisation: f64,
    },
}

impl TrafficAssignStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::BidirectionalFit {
                isl_capacity,
                uplink_capacity,
                utilisation,
            } => format!("tasg_bidi_i{isl_capacity}u{uplink_capacity}x{utilisation}"),
        }
    }

    /// Builds the bandwidth table and fits the demands into it.
    pub fn compute(
        &self,
        demands: &[TrafficDemand],
        path_data: &PathData,
        edge_data: &EdgeData,
    ) -> BwData {
        match self {
            Self::BidirectionalFit {
                isl_capacity,
                uplink_capacity,
                utilisation,
            } => {
                let capacity_of = |ed: (NodeId, NodeId)| {
                    if ed.0 == GROUND || ed.1 == GROUND {
                        *uplink_capacity
                    } else {
                        *isl_capacity
                    }
                };
                let mut bw_data: BwData = edge_data
                    .keys()
                    .map(|&ed| (ed, BwInfo::idle(capacity_of(ed))))
                    .collect();

                let mut allocated = 0usize;
                let mut dropped = 0usize;
                for demand in demands {
                    let (key, _) = ordered_pair((demand.src, demand.trg));
                    let Some(route) = path_data
                        .get(&key)
                        .and_then(|routes| routes.get(demand.path_idx))
                    else {
                        dropped += 1;
                        continue;
                    };
                    if route.nodes.len() < 2 {
                        dropped += 1;
                        continue;
                    }

                    // Canonical form: concrete endpoints become the ground
                    // sentinel, matching the bandwidth table's uplink keys.
                    let mut canonical = route.nodes.clone();
                    canonical[0] = GROUND;
                    let last = canonical.len() - 1;
                    canonical[last] = GROUND;

                    let fits = path_edges(&canonical).all(|ed| {
                        let info = bw_data.entry(ed).or_insert_with(|| BwInfo::idle(capacity_of(ed)));
                        let used = info.capacity - info.idle_bw;
                        used + demand.amount <= utilisation * info.capacity
                    });
                    if !fits {
                        dropped += 1;
                        continue;
                    }
                    allocated += 1;
                    for ed in path_edges(&canonical) {
                        for key in [ed, reverse_edge(ed)] {
                            let info =
                                bw_data.entry(key).or_insert_with(|| BwInfo::idle(capacity_of(key)));
                            info.idle_bw -= demand.amount;
                        }
                    }
                }
                tracing::debug!(allocated, dropped, "traffic assignment done");
                bw_data
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{check_bandwidth_invariant, EdgeInfo, RoutedPath};

    fn two_hop_network() -> (PathData, EdgeData) {
        let mut path_data = PathData::new();
        path_data.insert(
            (1, 2),
            vec![RoutedPath {
                nodes: vec![1, 101, 102, 2],
                cost: 3.0,
            }],
        );
        let mut edge_data = EdgeData::new();
        for ed in [
            (GROUND, 101),
            (101, GROUND),
            (101, 102),
            (102, 101),
            (GROUND, 102),
            (102, GROUND),
        ] {
            edge_data.insert(ed, EdgeInfo::default());
        }
        (path_data, edge_data)
    }

    #[test]
    fn random_pairs_only_pick_existing_keys() {
        let (path_data, _) = two_hop_network();
        let strat = TrafficSelectStrategy::RandomPairs {
            demands: 5,
            amount: 1.0,
            seed: 3,
        };
        let demands = strat.compute(&path_data);
        assert_eq!(demands.len(), 5);
        assert!(demands.iter().all(|d| (d.src, d.trg) == (1, 2)));
    }

    #[test]
    fn assignment_consumes_both_directions() {
        let (path_data, edge_data) = two_hop_network();
        let strat = TrafficAssignStrategy::BidirectionalFit {
            isl_capacity: 10.0,
            uplink_capacity: 10.0,
            utilisation: 1.0,
        };
        let demands = vec![TrafficDemand {
            src: 1,
            trg: 2,
            path_idx: 0,
            amount: 2.0,
        }];
        let bw = strat.compute(&demands, &path_data, &edge_data);
        assert_eq!(bw[&(101, 102)].idle_bw, 8.0);
        assert_eq!(bw[&(102, 101)].idle_bw, 8.0);
        assert_eq!(bw[&(GROUND, 101)].idle_bw, 8.0);
        check_bandwidth_invariant(&bw).expect("invariant");
    }

    #[test]
    fn utilisation_bound_drops_excess_demands() {
        let (path_data, edge_data) = two_hop_network();
        let strat = TrafficAssignStrategy::BidirectionalFit {
            isl_capacity: 10.0,
            uplink_capacity: 10.0,
            utilisation: 0.5,
        };
        // Three 2.0 demands on a 10.0 edge with a 5.0 usable bound: the
        // third no longer fits.
        let demand = TrafficDemand {
            src: 1,
            trg: 2,
            path_idx: 0,
            amount: 2.0,
        };
        let bw = strat.compute(&[demand, demand, demand], &path_data, &edge_data);
        assert_eq!(bw[&(101, 102)].idle_bw, 6.0);
        check_bandwidth_invariant(&bw).expect("invariant");
    }

    #[test]
    fn missing_path_is_dropped_not_fatal() {
        let (path_data, edge_data) = two_hop_network();
        let strat = TrafficAssignStrategy::BidirectionalFit {
            isl_capacity: 10.0,
            uplink_capacity: 10.0,
            utilisation: 1.0,
        };
        let demands = vec![TrafficDemand {
            src: 5,
            trg: 6,
            path_idx: 0,
            amount: 2.0,
        }];
        let bw = strat.compute(&demands, &path_data, &edge_data);
        assert!(bw.values().all(|info| info.idle_bw == info.capacity));
    }
}
