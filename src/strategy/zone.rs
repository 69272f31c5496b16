//! Zone selection, construction and edge admissibility.

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::{haversine_km, Edge, GridPos, NodeId, ZonePair, GROUND};

/// Chooses the zone-pair centers to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneSelectStrategy {
    /// Seeded uniform sampling of distinct center pairs.
    RandomSeed { samples: usize, seed: u64 },
    /// An explicit center-pair list, e.g. derived from city pairs.
    FixedPairs { pairs: Vec<(NodeId, NodeId)> },
}

impl ZoneSelectStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::RandomSeed { samples, seed } => format!("zsel_rand{samples}s{seed}"),
            Self::FixedPairs { pairs } => format!("zsel_fixed{}", pairs.len()),
        }
    }

    /// Returns the center pairs to analyze, in sample order.
    pub fn compute(&self, grid: &GridPos) -> Vec<(NodeId, NodeId)> {
        match self {
            Self::RandomSeed { samples, seed } => {
                let ids: Vec<NodeId> = grid.keys().copied().collect();
                if ids.len() < 2 {
                    return Vec::new();
                }
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                let mut pairs = Vec::with_capacity(*samples);
                for _ in 0..*samples {
                    let a = rng.random_range(0..ids.len());
                    let mut b = rng.random_range(0..ids.len() - 1);
                    if b >= a {
                        b += 1;
                    }
                    pairs.push((ids[a], ids[b]));
                }
                pairs
            }
            Self::FixedPairs { pairs } => pairs.clone(),
        }
    }
}

/// Builds a zone of grid points around a center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneBuildStrategy {
    /// The `zone_size` grid points nearest to the center by great-circle
    /// distance, center included.
    KNearest { zone_size: usize },
}

impl ZoneBuildStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::KNearest { zone_size } => format!("zbld_k{zone_size}"),
        }
    }

    /// Builds both zones of a pair from their centers.
    pub fn compute(&self, grid: &GridPos, center1: NodeId, center2: NodeId) -> ZonePair {
        ZonePair {
            zone1: self.build_zone(grid, center1),
            zone2: self.build_zone(grid, center2),
        }
    }

    fn build_zone(&self, grid: &GridPos, center: NodeId) -> Vec<NodeId> {
        match self {
            Self::KNearest { zone_size } => {
                let Some(center_pos) = grid.get(&center) else {
                    return Vec::new();
                };
                let mut by_distance: Vec<(f64, NodeId)> = grid
                    .iter()
                    .map(|(id, pos)| (haversine_km(center_pos, pos), *id))
                    .collect();
                by_distance
                    .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
                by_distance
                    .into_iter()
                    .take(*zone_size)
                    .map(|(_, id)| id)
                    .collect()
            }
        }
    }
}

/// Decides which edges may participate in a bottleneck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeAdmissionStrategy {
    /// Inter-satellite links only: an attack on up/downlinks would also
    /// hit the attacker's own traffic.
    IslOnly,
    /// Every edge is admissible.
    All,
}

impl EdgeAdmissionStrategy {
    pub fn description(&self) -> String {
        match self {
            Self::IslOnly => "zedg_isl".to_string(),
            Self::All => "zedg_all".to_string(),
        }
    }

    pub fn admits(&self, ed: Edge) -> bool {
        match self {
            Self::IslOnly => ed.0 != GROUND && ed.1 != GROUND,
            Self::All => true,
        }
    }
}
