// src/config/mod.rs - Planner configuration loaded from TOML
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::oracle::KinematicLimits;
use crate::motion::planner::{MAX_TIME_STEPS, Thresholds};
use crate::motion::segments::SolverConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration; every section may be omitted
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub limits: KinematicLimits,

    #[serde(default)]
    pub planner: PlannerSettings,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub solver: SolverConfig,
}

/// Discrete-time planning settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PlannerSettings {
    /// Integration time step (seconds)
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// Hard cap on time steps per planning call
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            time_step: default_time_step(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_time_step() -> f64 { 0.01 }
fn default_max_steps() -> usize { MAX_TIME_STEPS }

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("limits.max_velocity", self.limits.max_velocity),
            ("limits.max_acceleration", self.limits.max_acceleration),
            ("limits.max_jerk", self.limits.max_jerk),
            ("planner.time_step", self.planner.time_step),
            ("thresholds.position", self.thresholds.position),
            ("thresholds.velocity", self.thresholds.velocity),
            ("thresholds.acceleration", self.thresholds.acceleration),
            ("solver.tolerance", self.solver.tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{} must be a positive number, got {}", name, value));
            }
        }
        if self.planner.max_steps < 2 {
            return Err(format!("planner.max_steps must be at least 2, got {}", self.planner.max_steps));
        }
        if self.solver.max_iterations == 0 || self.solver.restarts == 0 {
            return Err("solver.max_iterations and solver.restarts must be non-zero".to_string());
        }
        if let (Some(min), Some(max)) = (self.limits.min_position, self.limits.max_position) {
            if min > max {
                return Err(format!("limits.min_position {} exceeds limits.max_position {}", min, max));
            }
        }
        Ok(())
    }
}

/// Read, parse and validate a TOML configuration file
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate().map_err(|e| {
        tracing::error!("Invalid config '{}': {}", path, e);
        ConfigError::Invalid(e)
    })?;
    tracing::debug!("Loaded configuration from {}", path);
    Ok(config)
}
