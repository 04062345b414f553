// src/motion/planner/mod.rs - Discrete-time goal planner
//
// Drives a single degree of freedom from rest toward a goal position one time
// step at a time. A step is only committed if a braking maneuver to rest still
// exists from the resulting state, so the plan can always be cut short safely.

pub mod stopping;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::motion::oracle::{FeasibilityOracle, GoalBound, Mirrored};
use crate::motion::trajectory::{KinematicState, Trajectory, TrajectorySample};
use stopping::StoppingPlanner;

/// Default cap on time steps for a single planning call
pub const MAX_TIME_STEPS: usize = 10_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("no feasible jerk command at step {step} ({} candidates rejected)", .rejections.len())]
    InfeasibleStep { step: usize, rejections: Vec<Rejection> },
    #[error("no solution within {max_steps} time steps")]
    StepBudgetExceeded { max_steps: usize },
    #[error("segment solver did not converge after {iterations} iterations (residual {residual:e})")]
    SolverDidNotConverge { iterations: usize, residual: f64 },
    #[error("no feasible switch to positive jerk after {searched} candidates")]
    NoValidSwitchPoint { searched: usize },
    #[error("no feasible braking command at step {step}")]
    NoBrakingCommand { step: usize },
    #[error("no non-negative segment durations for delta_2 = {delta_2}")]
    NoValidRoots { delta_2: f64 },
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("planning cancelled at step {step}")]
    Cancelled { step: usize },
}

impl PlanError {
    /// True for outcomes that only mean "no way to stop from this state".
    /// The goal planner treats these as a rejected candidate.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, PlanError::NoValidSwitchPoint { .. } | PlanError::NoBrakingCommand { .. })
    }
}

/// Why a candidate jerk command was not committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The oracle rejected the state the command leads to
    Oracle,
    /// The command leaves the state unchanged
    NoProgress,
    /// No braking maneuver exists from the resulting state
    NoStoppingTrajectory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    pub jerk: f64,
    pub reason: RejectReason,
}

/// How close a quantity must be to its target to count as reached.
///
/// Needed because planning integrates with a fixed time step. The values must
/// be small enough that commanding zero input from such a state stays within
/// every limit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_threshold")]
    pub position: f64,
    #[serde(default = "default_threshold")]
    pub velocity: f64,
    #[serde(default = "default_threshold")]
    pub acceleration: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            position: default_threshold(),
            velocity: default_threshold(),
            acceleration: default_threshold(),
        }
    }
}

fn default_threshold() -> f64 { 0.01 }

/// Result of [`DiscretePlanner::plan_detailed`]
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Start sample, forward steps, then the spliced stopping trajectory
    pub trajectory: Trajectory,
    /// Stopping trajectory from the state committed at each step index
    pub stopping_trajectories: BTreeMap<usize, Trajectory>,
}

/// Greedy discrete-time planner toward a goal position
#[derive(Debug, Clone)]
pub struct DiscretePlanner {
    max_jerk: f64,
    time_step: f64,
    max_steps: usize,
    thresholds: Thresholds,
}

impl DiscretePlanner {
    pub fn new(max_jerk: f64, time_step: f64) -> Result<Self, PlanError> {
        if !(max_jerk.is_finite() && max_jerk > 0.0) {
            return Err(PlanError::InvalidParameters(format!("max jerk must be > 0, got {}", max_jerk)));
        }
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(PlanError::InvalidParameters(format!("time step must be > 0, got {}", time_step)));
        }
        Ok(Self {
            max_jerk,
            time_step,
            max_steps: MAX_TIME_STEPS,
            thresholds: Thresholds::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PlanError> {
        Ok(Self::new(config.limits.max_jerk, config.planner.time_step)?
            .with_max_steps(config.planner.max_steps)
            .with_thresholds(config.thresholds))
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Stopping planner sharing this planner's jerk, time step and thresholds
    pub fn stopping_planner<'a, O: FeasibilityOracle + ?Sized>(&self, oracle: &'a O) -> StoppingPlanner<'a, O> {
        StoppingPlanner::new(oracle, self.max_jerk, self.time_step, self.thresholds, self.max_steps)
    }

    /// Plan from rest at `start` to rest at `goal`
    pub fn plan<O: FeasibilityOracle + ?Sized>(&self, start: f64, goal: f64, oracle: &O) -> Result<Trajectory, PlanError> {
        self.run(start, goal, oracle, &|| false, false)
            .map(|outcome| outcome.trajectory)
    }

    /// Like [`plan`](Self::plan), checking `cancelled` before every step
    pub fn plan_cancellable<O: FeasibilityOracle + ?Sized>(
        &self,
        start: f64,
        goal: f64,
        oracle: &O,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<Trajectory, PlanError> {
        self.run(start, goal, oracle, cancelled, false)
            .map(|outcome| outcome.trajectory)
    }

    /// Like [`plan`](Self::plan), also returning the stopping trajectory
    /// computed at every step
    pub fn plan_detailed<O: FeasibilityOracle + ?Sized>(&self, start: f64, goal: f64, oracle: &O) -> Result<PlanOutcome, PlanError> {
        self.run(start, goal, oracle, &|| false, true)
    }

    fn run<O: FeasibilityOracle + ?Sized>(
        &self,
        start: f64,
        goal: f64,
        oracle: &O,
        cancelled: &dyn Fn() -> bool,
        record: bool,
    ) -> Result<PlanOutcome, PlanError> {
        if !(start.is_finite() && goal.is_finite()) {
            return Err(PlanError::InvalidParameters(format!("start {} and goal {} must be finite", start, goal)));
        }
        tracing::debug!(
            "planning {} -> {} (j_max={}, dt={}, max_steps={})",
            start,
            goal,
            self.max_jerk,
            self.time_step,
            self.max_steps
        );

        if goal >= start {
            return self.plan_forward(start, goal, oracle, cancelled, record);
        }

        // Plan the reflected move and reflect the result back.
        let mirrored = Mirrored::new(oracle);
        let outcome = self.plan_forward(-start, -goal, &mirrored, cancelled, record)?;
        Ok(PlanOutcome {
            trajectory: outcome.trajectory.mirrored(),
            stopping_trajectories: outcome
                .stopping_trajectories
                .into_iter()
                .map(|(step, trajectory)| (step, trajectory.mirrored()))
                .collect(),
        })
    }

    fn plan_forward<O: FeasibilityOracle + ?Sized>(
        &self,
        start: f64,
        goal: f64,
        oracle: &O,
        cancelled: &dyn Fn() -> bool,
        record: bool,
    ) -> Result<PlanOutcome, PlanError> {
        let bounded = GoalBound::new(oracle, goal + self.thresholds.position);
        let stopping = self.stopping_planner(&bounded);

        let mut current = KinematicState::at_rest(start);
        let mut forward = Trajectory::with_capacity(self.time_step, self.max_steps);
        forward.push(TrajectorySample::new(current, 0.0));
        let mut pending_stop = Trajectory::new(self.time_step);
        let mut stopping_trajectories = BTreeMap::new();

        for step in 1..self.max_steps {
            if current.position >= goal - self.thresholds.position {
                tracing::debug!(
                    "goal reached after {} steps, appending {} stopping samples",
                    step - 1,
                    pending_stop.len()
                );
                forward.append(pending_stop);
                return Ok(PlanOutcome {
                    trajectory: forward,
                    stopping_trajectories,
                });
            }
            if cancelled() {
                return Err(PlanError::Cancelled { step });
            }

            let (next, jerk, stop) = self.choose_command(step, current, &bounded, &stopping)?;
            forward.push(TrajectorySample::new(next, jerk));
            if record {
                stopping_trajectories.insert(step, stop.clone());
            }
            pending_stop = stop;
            current = next;
        }

        tracing::warn!("goal {} not reached within {} steps", goal, self.max_steps);
        Err(PlanError::StepBudgetExceeded {
            max_steps: self.max_steps,
        })
    }

    /// Candidate jerk commands in priority order
    fn candidates(&self) -> [f64; 3] {
        [-self.max_jerk, 0.0, self.max_jerk]
    }

    /// Pick the most aggressive candidate whose resulting state is valid and
    /// can still be brought to rest
    fn choose_command<O: FeasibilityOracle + ?Sized>(
        &self,
        step: usize,
        current: KinematicState,
        oracle: &O,
        stopping: &StoppingPlanner<'_, O>,
    ) -> Result<(KinematicState, f64, Trajectory), PlanError> {
        let mut rejections = Vec::with_capacity(3);

        for jerk in self.candidates().into_iter().rev() {
            let next = current.step(jerk, self.time_step);
            if !oracle.is_valid(&next, jerk) {
                rejections.push(Rejection { jerk, reason: RejectReason::Oracle });
                continue;
            }
            if next == current {
                rejections.push(Rejection { jerk, reason: RejectReason::NoProgress });
                continue;
            }
            match stopping.plan(next) {
                Ok(stop) => {
                    tracing::trace!("step {}: jerk {} -> {:?}", step, jerk, next);
                    return Ok((next, jerk, stop));
                }
                Err(e) if e.is_infeasible() => {
                    rejections.push(Rejection { jerk, reason: RejectReason::NoStoppingTrajectory });
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!("no feasible jerk command at step {} from {:?}: {:?}", step, current, rejections);
        Err(PlanError::InfeasibleStep { step, rejections })
    }
}
