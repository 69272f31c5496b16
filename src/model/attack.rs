//! Attack analysis results.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::network::{Edge, NodeId, Path};

/// Single-link attack feasibility record for one edge.
///
/// `AttackData` maps every analyzed edge to `Some(info)` when the edge can
/// be saturated on its own, `None` when it cannot (present, not absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttackInfo {
    /// Bandwidth the attack places on the edge.
    pub attack_bw: f64,
    /// Number of distinct attack flows used.
    pub n_flows: u32,
    /// Fraction of the aggregate permitted uplink budget the attack
    /// consumes; a rough detectability proxy.
    pub detection_risk: f64,
}

/// Per-edge single-link attack feasibility for the whole network.
pub type AttackData = HashMap<Edge, Option<EdgeAttackInfo>>;

/// One attack flow in a feasible assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackFlow {
    /// Grid point originating the flow.
    pub source: NodeId,
    /// Bottleneck edge the flow is routed through.
    pub edge: Edge,
    /// Bandwidth carried by the flow.
    pub bw: f64,
}

/// Output of a successful feasibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityOutcome {
    /// The flow assignment saturating the candidate.
    pub flows: Vec<AttackFlow>,
    /// Total bandwidth landing on the candidate's edges.
    pub on_target_bw: f64,
    /// Fraction of the permitted uplink budget consumed.
    pub detection_risk: f64,
}

/// A pair of zones whose disconnection is being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePair {
    /// Grid points of the first zone, in selection order.
    pub zone1: Vec<NodeId>,
    /// Grid points of the second zone, in selection order.
    pub zone2: Vec<NodeId>,
}

impl ZonePair {
    /// Whether the zones share any grid point.
    pub fn overlaps(&self) -> bool {
        self.zone1.iter().any(|p| self.zone2.contains(p))
    }
}

/// Result of the zone-bottleneck analysis for one feasibly attacked pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBottleneckInfo {
    /// Candidate bottleneck edge-sets proposed by the selection strategy.
    pub bottlenecks: Vec<Vec<Edge>>,
    /// Deduplicated canonical cross-zone paths.
    pub cross_zone_paths: Vec<Path>,
    /// Grid point id -> number of accepted bottleneck edges it originates
    /// attack traffic through.
    pub grid_histogram: BTreeMap<NodeId, u32>,
}

/// Outcome record for one zone-pair sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAttackRecord {
    /// The analyzed zone pair.
    pub pair: ZonePair,
    /// `Some` when a feasible attack exists, `None` when the pair was
    /// analyzed and rejected.
    pub outcome: Option<ZoneBottleneckInfo>,
}

/// Zone-attack results keyed by sample index.
///
/// Overlapping pairs are excluded from analysis and have no entry here.
pub type ZoneAttackData = BTreeMap<usize, ZoneAttackRecord>;
