//! Engine adapter for the zone-bottleneck payload.

use crate::analysis::{analyze_zone_pair, ZoneBottleneckParams, ZoneOutcome};
use crate::model::{ZoneBottleneckInfo, ZonePair};
use crate::multiproc::{ResultMap, SampleProcessor};

/// Per-sample processor for [`crate::job::JobKind::ZoneBottleneck`].
///
/// Overlapping pairs produce no entry at all; analyzed-but-rejected pairs
/// produce an explicit `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZoneBottleneckProcessor;

impl SampleProcessor for ZoneBottleneckProcessor {
    type Sample = ZonePair;
    type Params = ZoneBottleneckParams;
    type Output = Option<ZoneBottleneckInfo>;

    fn process_sample(
        &self,
        index: usize,
        sample: &ZonePair,
        params: &ZoneBottleneckParams,
        out: &mut ResultMap<Option<ZoneBottleneckInfo>>,
    ) {
        match analyze_zone_pair(sample, params) {
            ZoneOutcome::Excluded => {}
            ZoneOutcome::Rejected => {
                out.insert(index, None);
            }
            ZoneOutcome::Feasible(info) => {
                out.insert(index, Some(info));
            }
        }
    }
}
