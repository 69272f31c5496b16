//! Domain data model for constellation attack analysis.
//!
//! These are the shared read-only structures that travel inside
//! `ProcessParameters` bundles to local threads and remote workers:
//! the grid, the precomputed path tables, the per-edge back-references,
//! bandwidth state, and attack results.

pub mod attack;
pub mod bandwidth;
pub mod network;

pub use attack::{
    AttackData, AttackFlow, EdgeAttackInfo, FeasibilityOutcome, ZoneAttackData, ZoneAttackRecord,
    ZoneBottleneckInfo, ZonePair,
};
pub use bandwidth::{
    check_bandwidth_invariant, uplink_capacity, BandwidthViolation, BwData, BwInfo,
};
pub use network::{
    haversine_km, ordered_pair, path_edges, reverse_edge, Edge, EdgeData, EdgeInfo, GeoPoint,
    GridPos, NodeId, Path, PathData, PathRef, RoutedPath, GROUND,
};
