//! Zone-bottleneck attack phase.

use async_trait::async_trait;

use crate::analysis::ZoneBottleneckParams;
use crate::dispatch::{run_distributed, ExecutionMode};
use crate::job::{JobKind, ZoneBottleneckProcessor};
use crate::model::{
    AttackData, BwData, EdgeData, GridPos, PathData, ZoneAttackData, ZoneAttackRecord, ZonePair,
};
use crate::multiproc::index_samples;
use crate::strategy::{
    BottleneckStrategy, EdgeAdmissionStrategy, FeasibilityStrategy, GeoConstraintStrategy,
    PathFilterStrategy, ZoneBuildStrategy, ZoneSelectStrategy,
};

use super::{CachePolicy, Phase, PhaseError};

/// Evaluates zone-pair disconnection attacks: selects center pairs,
/// builds the zones, and fans the per-pair bottleneck analysis out
/// through the configured execution mode.
#[derive(Debug, Clone)]
pub struct ZoneBottleneckPhase {
    pub policy: CachePolicy,
    pub mode: ExecutionMode,
    pub geo_constr_strat: GeoConstraintStrategy,
    pub select_strat: ZoneSelectStrategy,
    pub build_strat: ZoneBuildStrategy,
    pub edges_strat: EdgeAdmissionStrategy,
    pub bneck_strat: BottleneckStrategy,
    pub filter_strat: PathFilterStrategy,
    pub feas_strat: FeasibilityStrategy,
}

#[async_trait]
impl Phase for ZoneBottleneckPhase {
    type Input = (GridPos, PathData, EdgeData, BwData, AttackData);
    type Output = ZoneAttackData;

    fn name(&self) -> &'static str {
        "ZoneBottlePhase"
    }

    fn input_properties(&self) -> Vec<&'static str> {
        vec!["gridPos", "pathData", "edgeData", "bwData", "atkData"]
    }

    fn output_properties(&self) -> Vec<&'static str> {
        vec!["zoneAtkData"]
    }

    fn strategy_descriptions(&self) -> Vec<String> {
        vec![
            self.geo_constr_strat.description(),
            self.select_strat.description(),
            self.build_strat.description(),
            self.edges_strat.description(),
            self.bneck_strat.description(),
            self.filter_strat.description(),
            self.feas_strat.description(),
        ]
    }

    fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    async fn compute(&self, input: Self::Input) -> Result<Self::Output, PhaseError> {
        let (grid, path_data, edge_data, bw_data, atk_data) = input;
        let allowed_sources = self.geo_constr_strat.compute(&grid);

        let pairs: Vec<ZonePair> = self
            .select_strat
            .compute(&grid)
            .into_iter()
            .map(|(c1, c2)| self.build_strat.compute(&grid, c1, c2))
            .collect();

        let params = ZoneBottleneckParams {
            edges_strat: self.edges_strat,
            bneck_strat: self.bneck_strat.clone(),
            filter_strat: self.filter_strat,
            feas_strat: self.feas_strat.clone(),
            path_data,
            edge_data,
            bw_data,
            atk_data,
            allowed_sources,
        };

        let result_map = run_distributed::<ZoneBottleneckProcessor>(
            &self.mode,
            JobKind::ZoneBottleneck,
            index_samples(pairs.clone()),
            params,
        )
        .await?;

        // Overlapping pairs never made it into the map; everything else
        // keeps its sample index.
        let records: ZoneAttackData = result_map
            .into_iter()
            .map(|(idx, outcome)| {
                (
                    idx,
                    ZoneAttackRecord {
                        pair: pairs[idx].clone(),
                        outcome,
                    },
                )
            })
            .collect();
        Ok(records)
    }

    fn check_result(&self, result: &Self::Output) -> Result<(), PhaseError> {
        for (idx, record) in result {
            if let Some(info) = &record.outcome {
                if !info.cross_zone_paths.is_empty() && info.bottlenecks.is_empty() {
                    return Err(PhaseError::InvariantViolation(format!(
                        "sample {idx}: feasible outcome without bottleneck candidates"
                    )));
                }
            }
        }
        Ok(())
    }
}
