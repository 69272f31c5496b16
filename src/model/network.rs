//! Grid, path and edge structures.
//!
//! Grid points and satellites share one id space. Paths are stored once per
//! ordered `(src, trg)` pair; lookups for the reversed pair reuse the same
//! entry with the path reversed. The ground sentinel replaces concrete
//! endpoints when paths are compared across different grid-point pairs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Identifier of a grid point or satellite node.
pub type NodeId = i32;

/// Sentinel id standing in for "the ground segment" at path endpoints.
pub const GROUND: NodeId = -1;

/// A directed link between two nodes. Uplink edges have `GROUND` first,
/// downlink edges have `GROUND` second.
pub type Edge = (NodeId, NodeId);

/// A node sequence, endpoints included.
pub type Path = Vec<NodeId>;

/// Geographic position of a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Positions of all grid points, keyed by id.
///
/// Ordered so that iteration (and anything derived from it, like seeded
/// sampling) is deterministic across runs and hosts.
pub type GridPos = BTreeMap<NodeId, GeoPoint>;

/// One precomputed route between a pair of grid points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPath {
    /// Node sequence from source to target, endpoints included.
    pub nodes: Path,
    /// Routing cost of this path.
    pub cost: f64,
}

/// Precomputed path sets, keyed by ordered `(src, trg)` pair.
pub type PathData = HashMap<Edge, Vec<RoutedPath>>;

/// Reference to one stored path: `(src, trg, index within the pair's set)`.
pub type PathRef = (NodeId, NodeId, usize);

/// Per-edge back-references into the path tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Paths that traverse this edge in its stored orientation.
    pub paths_through: Vec<PathRef>,
}

/// Edge table for the whole network.
pub type EdgeData = HashMap<Edge, EdgeInfo>;

/// Returns the ordered form of a pair and whether it was already ordered.
///
/// Path tables are keyed by ordered pairs only; the flag tells the caller
/// whether the stored paths must be reversed for its query direction.
pub fn ordered_pair(pair: Edge) -> (Edge, bool) {
    if pair.0 <= pair.1 {
        (pair, true)
    } else {
        ((pair.1, pair.0), false)
    }
}

/// Iterates the consecutive edges of a path.
pub fn path_edges(path: &[NodeId]) -> impl Iterator<Item = Edge> + '_ {
    path.windows(2).map(|w| (w[0], w[1]))
}

/// The same edge in the opposite direction.
pub fn reverse_edge(ed: Edge) -> Edge {
    (ed.1, ed.0)
}

/// Great-circle distance between two grid points, in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}
