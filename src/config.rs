//! Engine configuration.
//!
//! One JSON file configures a simulation run: cache and input locations,
//! the execution mode shared by the dispatched phases, and the strategy
//! stack of every phase. All fields have defaults, so a minimal config
//! can override just the execution mode.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::ExecutionMode;
use crate::phase::CachePolicy;
use crate::strategy::{
    BottleneckStrategy, EdgeAdmissionStrategy, FeasibilityStrategy, GeoConstraintStrategy,
    PathFilterStrategy, TrafficAssignStrategy, TrafficSelectStrategy, ZoneBuildStrategy,
    ZoneSelectStrategy,
};

/// Errors of configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for phase cache artifacts.
    pub cache_dir: PathBuf,
    /// Artifact holding the externally produced simulation inputs.
    pub inputs_path: PathBuf,
    /// Execution mode of the dispatched phases.
    pub execution: ExecutionMode,
    pub traffic: TrafficConfig,
    pub link_attack: LinkAttackConfig,
    pub zone_attack: ZoneAttackConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("results"),
            inputs_path: PathBuf::from("inputs.res.gz"),
            execution: ExecutionMode::default(),
            traffic: TrafficConfig::default(),
            link_attack: LinkAttackConfig::default(),
            zone_attack: ZoneAttackConfig::default(),
        }
    }
}

/// Traffic phase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub policy: CachePolicy,
    pub select: TrafficSelectStrategy,
    pub assign: TrafficAssignStrategy,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            select: TrafficSelectStrategy::RandomPairs {
                demands: 1000,
                amount: 1.0,
                seed: 42,
            },
            assign: TrafficAssignStrategy::BidirectionalFit {
                isl_capacity: 500.0,
                uplink_capacity: 200.0,
                utilisation: 0.9,
            },
        }
    }
}

/// Link-attack phase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkAttackConfig {
    pub policy: CachePolicy,
    pub edges: EdgeAdmissionStrategy,
    pub geo_constraint: GeoConstraintStrategy,
    pub filter: PathFilterStrategy,
    pub feasibility: FeasibilityStrategy,
}

impl Default for LinkAttackConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            edges: EdgeAdmissionStrategy::IslOnly,
            geo_constraint: GeoConstraintStrategy::AllowAll,
            filter: PathFilterStrategy::AllowedSourcesOnly,
            feasibility: FeasibilityStrategy::CapacityGreedy,
        }
    }
}

/// Zone-attack phase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAttackConfig {
    pub policy: CachePolicy,
    pub select: ZoneSelectStrategy,
    pub build: ZoneBuildStrategy,
    pub edges: EdgeAdmissionStrategy,
    pub geo_constraint: GeoConstraintStrategy,
    pub bottleneck: BottleneckStrategy,
    pub filter: PathFilterStrategy,
    pub feasibility: FeasibilityStrategy,
}

impl Default for ZoneAttackConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            select: ZoneSelectStrategy::RandomSeed {
                samples: 100,
                seed: 42,
            },
            build: ZoneBuildStrategy::KNearest { zone_size: 9 },
            edges: EdgeAdmissionStrategy::IslOnly,
            geo_constraint: GeoConstraintStrategy::AllowAll,
            bottleneck: BottleneckStrategy::GreedyCover {
                max_candidates: 5,
                max_edges: 8,
            },
            filter: PathFilterStrategy::AllowedSourcesOnly,
            feasibility: FeasibilityStrategy::CapacityGreedy,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural sanity checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.execution {
            ExecutionMode::Local { settings } => {
                if settings.num_procs == 0 {
                    return Err(ConfigError::Invalid("local num_procs must be > 0".into()));
                }
            }
            ExecutionMode::File { config } => {
                if config.num_jobs == 0 {
                    return Err(ConfigError::Invalid("file num_jobs must be > 0".into()));
                }
                if config.poll_interval.is_zero() {
                    return Err(ConfigError::Invalid("file poll_interval must be > 0".into()));
                }
            }
            ExecutionMode::Socket { config } => {
                if config.num_jobs == 0 {
                    return Err(ConfigError::Invalid("socket num_jobs must be > 0".into()));
                }
                if config.max_attempts == 0 {
                    return Err(ConfigError::Invalid(
                        "socket max_attempts must be > 0".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SocketDispatchConfig;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().expect("valid");
    }

    #[test]
    fn config_json_round_trips() {
        let mut config = EngineConfig::default();
        config.execution = ExecutionMode::Socket {
            config: SocketDispatchConfig::default(),
        };
        let json = serde_json::to_string_pretty(&config).expect("serialize");
        let parsed: EngineConfig = serde_json::from_str(&json).expect("parse");
        parsed.validate().expect("valid");
        assert_eq!(
            serde_json::to_string(&parsed).expect("re-serialize"),
            serde_json::to_string(&config).expect("serialize again")
        );
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{"cache_dir": "elsewhere"}"#).expect("parse");
        assert_eq!(parsed.cache_dir, PathBuf::from("elsewhere"));
        assert!(matches!(parsed.execution, ExecutionMode::Local { .. }));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        let mut config = EngineConfig::default();
        config.execution = ExecutionMode::Socket {
            config: SocketDispatchConfig {
                num_jobs: 0,
                ..SocketDispatchConfig::default()
            },
        };
        assert!(config.validate().is_err());
    }
}
