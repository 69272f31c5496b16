//! Traffic assignment phase.

use async_trait::async_trait;

use crate::model::{check_bandwidth_invariant, BwData, EdgeData, GridPos, PathData};
use crate::strategy::{TrafficAssignStrategy, TrafficSelectStrategy};

use super::{CachePolicy, Phase, PhaseError};

/// Produces the network's bandwidth table by fitting a selected demand
/// set onto the edges. Purely local; the per-demand work is too cheap to
/// dispatch.
#[derive(Debug, Clone)]
pub struct TrafficPhase {
    pub policy: CachePolicy,
    pub select_strat: TrafficSelectStrategy,
    pub assign_strat: TrafficAssignStrategy,
}

#[async_trait]
impl Phase for TrafficPhase {
    type Input = (GridPos, PathData, EdgeData);
    type Output = BwData;

    fn name(&self) -> &'static str {
        "TrafficPhase"
    }

    fn input_properties(&self) -> Vec<&'static str> {
        vec!["gridPos", "pathData", "edgeData"]
    }

    fn output_properties(&self) -> Vec<&'static str> {
        vec!["bwData"]
    }

    fn strategy_descriptions(&self) -> Vec<String> {
        vec![self.select_strat.description(), self.assign_strat.description()]
    }

    fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    async fn compute(&self, input: Self::Input) -> Result<Self::Output, PhaseError> {
        let (_grid, path_data, edge_data) = input;
        let select_strat = self.select_strat.clone();
        let assign_strat = self.assign_strat.clone();
        tokio::task::spawn_blocking(move || {
            let demands = select_strat.compute(&path_data);
            assign_strat.compute(&demands, &path_data, &edge_data)
        })
        .await
        .map_err(|e| {
            PhaseError::Dispatch(crate::dispatch::DispatchError::LocalExecution(e.to_string()))
        })
    }

    fn check_result(&self, result: &Self::Output) -> Result<(), PhaseError> {
        check_bandwidth_invariant(result)
            .map_err(|violation| PhaseError::InvariantViolation(violation.to_string()))
    }
}
