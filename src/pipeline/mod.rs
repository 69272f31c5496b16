//! Simulation pipeline orchestration.
//!
//! Chains the implemented phases in dependency order — traffic
//! assignment, single-link attack, zone-bottleneck attack — feeding each
//! phase's declared inputs from prior outputs and running every stage
//! through the caching lifecycle of [`crate::phase::PhaseRunner`].
//!
//! The orbital inputs themselves (grid, path tables, edge tables) are
//! produced by external tooling and loaded from one artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::model::{AttackData, BwData, EdgeData, GridPos, PathData, ZoneAttackData};
use crate::phase::{
    ArtifactStore, LinkAttackPhase, PhaseError, PhaseRunner, TrafficPhase, ZoneBottleneckPhase,
};

/// Errors of a full pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("phase failed: {0}")]
    Phase(#[from] PhaseError),
}

/// Externally produced simulation inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInputs {
    pub grid: GridPos,
    pub path_data: PathData,
    pub edge_data: EdgeData,
}

/// All phase outputs of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutputs {
    pub bw_data: BwData,
    pub atk_data: AttackData,
    pub zone_attacks: ZoneAttackData,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Zone pairs with a feasible disconnection attack.
    pub feasible_zone_attacks: usize,
    /// Zone pairs analyzed and rejected.
    pub rejected_zone_attacks: usize,
}

/// The configured phase chain.
pub struct SimulationPipeline {
    runner: PhaseRunner,
    traffic: TrafficPhase,
    link_attack: LinkAttackPhase,
    zone_attack: ZoneBottleneckPhase,
}

impl SimulationPipeline {
    pub fn from_config(config: &EngineConfig) -> Self {
        let runner = PhaseRunner::new(ArtifactStore::new(&config.cache_dir));
        let traffic = TrafficPhase {
            policy: config.traffic.policy,
            select_strat: config.traffic.select.clone(),
            assign_strat: config.traffic.assign.clone(),
        };
        let link_attack = LinkAttackPhase {
            policy: config.link_attack.policy,
            mode: config.execution.clone(),
            edges_strat: config.link_attack.edges,
            geo_constr_strat: config.link_attack.geo_constraint.clone(),
            filter_strat: config.link_attack.filter,
            feas_strat: config.link_attack.feasibility.clone(),
        };
        let zone_attack = ZoneBottleneckPhase {
            policy: config.zone_attack.policy,
            mode: config.execution.clone(),
            geo_constr_strat: config.zone_attack.geo_constraint.clone(),
            select_strat: config.zone_attack.select.clone(),
            build_strat: config.zone_attack.build.clone(),
            edges_strat: config.zone_attack.edges,
            bneck_strat: config.zone_attack.bottleneck.clone(),
            filter_strat: config.zone_attack.filter,
            feas_strat: config.zone_attack.feasibility.clone(),
        };
        Self {
            runner,
            traffic,
            link_attack,
            zone_attack,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        self.runner.store()
    }

    /// Runs all phases. A fatal phase error aborts the run; it is logged
    /// here and propagated for the outer configuration loop to decide.
    pub async fn run(
        &self,
        inputs: SimulationInputs,
    ) -> Result<(SimulationOutputs, RunReport), PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, grid_points = inputs.grid.len(), "simulation pipeline starting");

        let outputs = match self.run_phases(&inputs).await {
            Ok(outputs) => outputs,
            Err(e) => {
                error!(%run_id, error = %e, "pipeline aborted");
                return Err(e);
            }
        };

        let feasible = outputs
            .zone_attacks
            .values()
            .filter(|r| r.outcome.is_some())
            .count();
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            feasible_zone_attacks: feasible,
            rejected_zone_attacks: outputs.zone_attacks.len() - feasible,
        };
        info!(
            %run_id,
            feasible = report.feasible_zone_attacks,
            rejected = report.rejected_zone_attacks,
            "simulation pipeline finished"
        );
        Ok((outputs, report))
    }

    async fn run_phases(
        &self,
        inputs: &SimulationInputs,
    ) -> Result<SimulationOutputs, PipelineError> {
        let bw_data = self
            .runner
            .execute(
                &self.traffic,
                (
                    inputs.grid.clone(),
                    inputs.path_data.clone(),
                    inputs.edge_data.clone(),
                ),
            )
            .await?;

        let atk_data = self
            .runner
            .execute(
                &self.link_attack,
                (
                    inputs.grid.clone(),
                    inputs.path_data.clone(),
                    inputs.edge_data.clone(),
                    bw_data.clone(),
                ),
            )
            .await?;

        let zone_attacks = self
            .runner
            .execute(
                &self.zone_attack,
                (
                    inputs.grid.clone(),
                    inputs.path_data.clone(),
                    inputs.edge_data.clone(),
                    bw_data.clone(),
                    atk_data.clone(),
                ),
            )
            .await?;

        Ok(SimulationOutputs {
            bw_data,
            atk_data,
            zone_attacks,
        })
    }
}
