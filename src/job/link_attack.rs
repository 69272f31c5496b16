//! Engine adapter for the single-link attack payload.

use crate::analysis::{analyze_single_edge, LinkAttackParams};
use crate::model::{Edge, EdgeAttackInfo};
use crate::multiproc::{ResultMap, SampleProcessor};

/// Per-sample processor for [`crate::job::JobKind::LinkAttack`].
///
/// Every edge sample gets an entry: `Some` when the edge can be saturated
/// on its own, `None` when it cannot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkAttackProcessor;

impl SampleProcessor for LinkAttackProcessor {
    type Sample = Edge;
    type Params = LinkAttackParams;
    type Output = Option<EdgeAttackInfo>;

    fn process_sample(
        &self,
        index: usize,
        sample: &Edge,
        params: &LinkAttackParams,
        out: &mut ResultMap<Option<EdgeAttackInfo>>,
    ) {
        out.insert(index, analyze_single_edge(*sample, params));
    }
}
