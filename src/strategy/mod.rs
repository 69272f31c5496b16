//! Pluggable analysis strategies.
//!
//! Every interchangeable step of the pipeline is a strategy: a closed,
//! serde-serializable enum whose variants are the available algorithms.
//! Strategies travel to remote workers inside `ProcessParameters` bundles,
//! so they must serialize; a closed enum also keeps the set resolvable at
//! compile time instead of by name lookup.
//!
//! Each strategy exposes `description()`, a short stable string of its
//! variant and parameters. Phase cache keys are derived from the
//! concatenated descriptions of a phase's strategies, so changing a
//! parameter changes the key.

pub mod attack;
pub mod traffic;
pub mod zone;

pub use attack::{
    BottleneckStrategy, DirectionData, FeasibilityStrategy, GeoConstraintStrategy,
    PathFilterStrategy,
};
pub use traffic::{TrafficAssignStrategy, TrafficDemand, TrafficSelectStrategy};
pub use zone::{EdgeAdmissionStrategy, ZoneBuildStrategy, ZoneSelectStrategy};
