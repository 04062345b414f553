// src/motion/planner/stopping.rs - Bang-bang braking to rest
use crate::motion::oracle::{FeasibilityOracle, Mirrored};
use crate::motion::planner::{PlanError, Thresholds};
use crate::motion::trajectory::{KinematicState, Trajectory, TrajectorySample};

/// Outcome of simulating one candidate switch from −j_max to +j_max
enum SwitchTrial {
    /// Acceleration and velocity both reached zero; the samples end there
    Succeeded(Vec<TrajectorySample>),
    /// Velocity reversed, a limit was hit, or no +j step was applied; an
    /// earlier switch may work
    TryEarlier,
    /// After at least one +j step, acceleration zeroed with velocity still
    /// above threshold. Earlier switches only leave more velocity, so the
    /// search ends here and the remainder is braked by a further maneuver.
    Residual(Vec<TrajectorySample>),
    /// Ran out of steps before either condition
    Exhausted,
}

/// Nested maneuvers allowed when a switch leaves residual velocity
const MAX_RESIDUAL_DEPTH: usize = 8;

/// Computes the fastest braking maneuver from a moving state to rest.
///
/// Phase one applies the most negative feasible jerk until velocity and
/// acceleration both drop below their thresholds. If that leaves a negative acceleration,
/// phase two searches backward from that instant for the latest point at
/// which switching to +j_max brings acceleration back to zero no later than
/// velocity.
///
/// States heading backward are braked in the reflected frame.
///
/// With a discrete time step the switch that zeroes both may fall between
/// two samples. The latest switch that leaves a small forward velocity is
/// then taken and the leftover velocity braked by another maneuver.
pub struct StoppingPlanner<'a, O: ?Sized> {
    oracle: &'a O,
    max_jerk: f64,
    time_step: f64,
    thresholds: Thresholds,
    max_steps: usize,
}

impl<'a, O: FeasibilityOracle + ?Sized> StoppingPlanner<'a, O> {
    pub fn new(oracle: &'a O, max_jerk: f64, time_step: f64, thresholds: Thresholds, max_steps: usize) -> Self {
        Self {
            oracle,
            max_jerk,
            time_step,
            thresholds,
            max_steps,
        }
    }

    /// Plan the stop. The returned trajectory excludes `start` itself and is
    /// empty when `start` is already at rest.
    pub fn plan(&self, start: KinematicState) -> Result<Trajectory, PlanError> {
        if !start.is_finite() {
            return Err(PlanError::InvalidParameters(format!("start state {:?} must be finite", start)));
        }
        if !self.is_heading_backward(&start) {
            return self.plan_nested(start, 0);
        }

        tracing::trace!("braking {:?} in the reflected frame", start);
        let mirrored = Mirrored::new(self.oracle);
        let reflected = StoppingPlanner::new(&mirrored, self.max_jerk, self.time_step, self.thresholds, self.max_steps);
        Ok(reflected.plan_nested(start.mirrored(), 0)?.mirrored())
    }

    /// Moving backward, or about to from near-zero velocity
    fn is_heading_backward(&self, state: &KinematicState) -> bool {
        state.velocity <= -self.thresholds.velocity
            || (state.velocity < self.thresholds.velocity && state.acceleration <= -self.thresholds.acceleration)
    }

    fn is_at_rest(&self, state: &KinematicState) -> bool {
        state.velocity.abs() < self.thresholds.velocity && state.acceleration.abs() < self.thresholds.acceleration
    }

    fn plan_nested(&self, start: KinematicState, depth: usize) -> Result<Trajectory, PlanError> {
        let braking = self.brake_to_zero_velocity(start)?;
        let stopped = braking.last().map_or(start, TrajectorySample::state);

        if stopped.acceleration > -self.thresholds.acceleration {
            return Ok(self.trajectory_after_start(braking));
        }

        self.recover_acceleration(&braking, depth)
    }

    /// Phase one. The first sample is `start` with zero jerk.
    fn brake_to_zero_velocity(&self, start: KinematicState) -> Result<Vec<TrajectorySample>, PlanError> {
        let mut samples = Vec::with_capacity(self.max_steps.min(1024));
        samples.push(TrajectorySample::new(start, 0.0));

        loop {
            let current = samples[samples.len() - 1].state();
            if current.velocity < self.thresholds.velocity && current.acceleration < self.thresholds.acceleration {
                return Ok(samples);
            }
            if samples.len() + 1 >= self.max_steps {
                tracing::warn!("braking from {:?} did not reach zero velocity in {} steps", start, self.max_steps);
                return Err(PlanError::StepBudgetExceeded {
                    max_steps: self.max_steps,
                });
            }

            let (next, jerk) = [-self.max_jerk, 0.0]
                .into_iter()
                .map(|jerk| (current.step(jerk, self.time_step), jerk))
                .find(|(next, jerk)| self.oracle.is_valid(next, *jerk))
                .ok_or(PlanError::NoBrakingCommand { step: samples.len() })?;
            samples.push(TrajectorySample::new(next, jerk));
        }
    }

    /// Phase two: scan switch points from the zero-velocity instant backward
    fn recover_acceleration(&self, braking: &[TrajectorySample], depth: usize) -> Result<Trajectory, PlanError> {
        let mut searched = 0;
        for switch_index in (1..=braking.len()).rev() {
            searched += 1;
            match self.try_switch(&braking[..switch_index]) {
                SwitchTrial::Succeeded(samples) => {
                    tracing::trace!("switching to +j at index {} after {} trials", switch_index, searched);
                    return Ok(self.trajectory_after_start(samples));
                }
                SwitchTrial::TryEarlier => continue,
                SwitchTrial::Residual(samples) => {
                    if depth >= MAX_RESIDUAL_DEPTH {
                        break;
                    }
                    let Some(end) = samples.last().map(TrajectorySample::state) else {
                        break;
                    };
                    tracing::trace!("switch at index {} leaves velocity {:.4}, braking again", switch_index, end.velocity);
                    let mut trajectory = self.trajectory_after_start(samples);
                    trajectory.append(self.plan_nested(end, depth + 1)?);
                    return Ok(trajectory);
                }
                SwitchTrial::Exhausted => {
                    return Err(PlanError::StepBudgetExceeded {
                        max_steps: self.max_steps,
                    });
                }
            }
        }
        Err(PlanError::NoValidSwitchPoint { searched })
    }

    /// Apply +j_max from the end of `prefix` until acceleration recovers
    fn try_switch(&self, prefix: &[TrajectorySample]) -> SwitchTrial {
        let mut samples = prefix.to_vec();
        loop {
            let current = samples[samples.len() - 1].state();
            if current.velocity <= -self.thresholds.velocity {
                return SwitchTrial::TryEarlier;
            }
            if current.acceleration > -self.thresholds.acceleration {
                return if self.is_at_rest(&current) {
                    SwitchTrial::Succeeded(samples)
                } else if samples.len() > prefix.len() && current.velocity >= self.thresholds.velocity {
                    SwitchTrial::Residual(samples)
                } else {
                    SwitchTrial::TryEarlier
                };
            }
            if samples.len() >= self.max_steps {
                return SwitchTrial::Exhausted;
            }

            let next = current.step(self.max_jerk, self.time_step);
            samples.push(TrajectorySample::new(next, self.max_jerk));
            if !self.oracle.is_valid(&next, self.max_jerk) {
                return SwitchTrial::TryEarlier;
            }
        }
    }

    fn trajectory_after_start(&self, mut samples: Vec<TrajectorySample>) -> Trajectory {
        samples.remove(0);
        Trajectory::from_samples(self.time_step, samples)
    }
}
