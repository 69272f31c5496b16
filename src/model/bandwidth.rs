//! Per-edge bandwidth state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::network::{Edge, GROUND};

/// Bandwidth state of one edge.
///
/// `idle_bw` is the remaining unallocated bandwidth; traffic assignment
/// decrements it, attacks try to saturate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BwInfo {
    /// Bandwidth still unallocated on this edge.
    pub idle_bw: f64,
    /// Total capacity of this edge.
    pub capacity: f64,
}

impl BwInfo {
    /// Creates a fully idle edge of the given capacity.
    pub fn idle(capacity: f64) -> Self {
        Self {
            idle_bw: capacity,
            capacity,
        }
    }
}

/// Bandwidth table for the whole network.
pub type BwData = HashMap<Edge, BwInfo>;

/// Violation of the bandwidth consistency invariant.
#[derive(Debug, Error)]
pub enum BandwidthViolation {
    #[error("edge ({0}, {1}): idle bandwidth {2} exceeds capacity {3}")]
    IdleAboveCapacity(i32, i32, f64, f64),

    #[error("edge ({0}, {1}): negative idle bandwidth {2}")]
    NegativeIdle(i32, i32, f64),
}

/// Checks `idle_bw <= capacity` and `idle_bw >= 0` for every edge.
///
/// Runs after every phase that touches bandwidth; a violation is fatal to
/// the pipeline.
pub fn check_bandwidth_invariant(bw_data: &BwData) -> Result<(), BandwidthViolation> {
    for (ed, info) in bw_data {
        if info.idle_bw > info.capacity {
            return Err(BandwidthViolation::IdleAboveCapacity(
                ed.0,
                ed.1,
                info.idle_bw,
                info.capacity,
            ));
        }
        if info.idle_bw < 0.0 {
            return Err(BandwidthViolation::NegativeIdle(ed.0, ed.1, info.idle_bw));
        }
    }
    Ok(())
}

/// Largest uplink capacity in the table.
///
/// Max rather than an arbitrary entry: bandwidth assignments may leave
/// uplink edges with differing capacities.
pub fn uplink_capacity(bw_data: &BwData) -> f64 {
    bw_data
        .iter()
        .filter(|(ed, _)| ed.0 == GROUND)
        .map(|(_, info)| info.capacity)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_accepts_consistent_table() {
        let mut bw = BwData::new();
        bw.insert((1, 2), BwInfo::idle(10.0));
        bw.insert((GROUND, 1), BwInfo { idle_bw: 3.0, capacity: 5.0 });
        assert!(check_bandwidth_invariant(&bw).is_ok());
    }

    #[test]
    fn invariant_rejects_idle_above_capacity() {
        let mut bw = BwData::new();
        bw.insert((1, 2), BwInfo { idle_bw: 11.0, capacity: 10.0 });
        assert!(matches!(
            check_bandwidth_invariant(&bw),
            Err(BandwidthViolation::IdleAboveCapacity(..))
        ));
    }

    #[test]
    fn invariant_rejects_negative_idle() {
        let mut bw = BwData::new();
        bw.insert((2, 1), BwInfo { idle_bw: -0.5, capacity: 10.0 });
        assert!(matches!(
            check_bandwidth_invariant(&bw),
            Err(BandwidthViolation::NegativeIdle(..))
        ));
    }

    #[test]
    fn uplink_capacity_is_max_over_ground_edges() {
        let mut bw = BwData::new();
        bw.insert((GROUND, 1), BwInfo::idle(4.0));
        bw.insert((GROUND, 2), BwInfo::idle(9.0));
        bw.insert((1, 2), BwInfo::idle(100.0));
        assert_eq!(uplink_capacity(&bw), 9.0);
    }

    #[test]
    fn uplink_capacity_zero_without_ground_edges() {
        let mut bw = BwData::new();
        bw.insert((1, 2), BwInfo::idle(100.0));
        assert_eq!(uplink_capacity(&bw), 0.0);
    }
}
