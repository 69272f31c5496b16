//! Single-link attack phase.

use async_trait::async_trait;

use crate::analysis::LinkAttackParams;
use crate::dispatch::{run_distributed, ExecutionMode};
use crate::job::{JobKind, LinkAttackProcessor};
use crate::model::{AttackData, BwData, Edge, EdgeData, GridPos, PathData};
use crate::multiproc::index_samples;
use crate::strategy::{
    EdgeAdmissionStrategy, FeasibilityStrategy, GeoConstraintStrategy, PathFilterStrategy,
};

use super::{CachePolicy, Phase, PhaseError};

/// Computes per-edge single-link attack feasibility over all admissible
/// edges, locally or dispatched to cluster workers.
#[derive(Debug, Clone)]
pub struct LinkAttackPhase {
    pub policy: CachePolicy,
    pub mode: ExecutionMode,
    pub edges_strat: EdgeAdmissionStrategy,
    pub geo_constr_strat: GeoConstraintStrategy,
    pub filter_strat: PathFilterStrategy,
    pub feas_strat: FeasibilityStrategy,
}

#[async_trait]
impl Phase for LinkAttackPhase {
    type Input = (GridPos, PathData, EdgeData, BwData);
    type Output = AttackData;

    fn name(&self) -> &'static str {
        "LinkAttackPhase"
    }

    fn input_properties(&self) -> Vec<&'static str> {
        vec!["gridPos", "pathData", "edgeData", "bwData"]
    }

    fn output_properties(&self) -> Vec<&'static str> {
        vec!["atkData"]
    }

    fn strategy_descriptions(&self) -> Vec<String> {
        vec![
            self.edges_strat.description(),
            self.geo_constr_strat.description(),
            self.filter_strat.description(),
            self.feas_strat.description(),
        ]
    }

    fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    async fn compute(&self, input: Self::Input) -> Result<Self::Output, PhaseError> {
        let (grid, path_data, edge_data, bw_data) = input;
        let allowed_sources = self.geo_constr_strat.compute(&grid);

        // Deterministic sample order: the result map is index-keyed.
        let mut samples: Vec<Edge> = edge_data
            .keys()
            .copied()
            .filter(|&ed| self.edges_strat.admits(ed))
            .collect();
        samples.sort();

        let params = LinkAttackParams {
            filter_strat: self.filter_strat,
            feas_strat: self.feas_strat.clone(),
            path_data,
            edge_data,
            bw_data,
            allowed_sources,
        };

        let mut result_map = run_distributed::<LinkAttackProcessor>(
            &self.mode,
            JobKind::LinkAttack,
            index_samples(samples.clone()),
            params,
        )
        .await?;

        let atk_data: AttackData = samples
            .into_iter()
            .enumerate()
            .map(|(idx, ed)| (ed, result_map.remove(&idx).flatten()))
            .collect();
        Ok(atk_data)
    }

    fn check_result(&self, result: &Self::Output) -> Result<(), PhaseError> {
        for (ed, info) in result {
            if let Some(info) = info {
                if info.attack_bw < 0.0 || (info.attack_bw > 0.0 && info.n_flows == 0) {
                    return Err(PhaseError::InvariantViolation(format!(
                        "edge ({}, {}) reports inconsistent attack flows",
                        ed.0, ed.1
                    )));
                }
            }
        }
        Ok(())
    }
}
