// src/motion/trajectory.rs
use serde::Serialize;

/// Kinematic state of the single degree of freedom at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KinematicState {
    /// Position (units)
    pub position: f64,

    /// Velocity (units/s)
    pub velocity: f64,

    /// Acceleration (units/s²)
    pub acceleration: f64,
}

impl KinematicState {
    pub fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    /// State with zero velocity and acceleration
    pub fn at_rest(position: f64) -> Self {
        Self::new(position, 0.0, 0.0)
    }

    /// Advance one discrete step holding `jerk` constant.
    ///
    /// Acceleration is updated first and the new value feeds velocity, which
    /// in turn feeds position (semi-implicit Euler).
    pub fn step(&self, jerk: f64, time_step: f64) -> Self {
        let acceleration = self.acceleration + jerk * time_step;
        let velocity = self.velocity + acceleration * time_step;
        let position = self.position + velocity * time_step;
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    /// Reflect the state through the origin
    pub fn mirrored(&self) -> Self {
        Self::new(-self.position, -self.velocity, -self.acceleration)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.acceleration.is_finite()
    }
}

/// One trajectory sample: the state reached at a time index and the jerk
/// commanded to reach it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
}

impl TrajectorySample {
    pub fn new(state: KinematicState, jerk: f64) -> Self {
        Self {
            position: state.position,
            velocity: state.velocity,
            acceleration: state.acceleration,
            jerk,
        }
    }

    pub fn state(&self) -> KinematicState {
        KinematicState::new(self.position, self.velocity, self.acceleration)
    }

    fn mirrored(&self) -> Self {
        Self::new(self.state().mirrored(), -self.jerk)
    }
}

/// Ordered samples spaced by a uniform time step.
///
/// A trajectory is a plain value owned by whoever produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    time_step: f64,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            samples: Vec::new(),
        }
    }

    pub fn with_capacity(time_step: f64, capacity: usize) -> Self {
        Self {
            time_step,
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn from_samples(time_step: f64, samples: Vec<TrajectorySample>) -> Self {
        Self { time_step, samples }
    }

    pub fn push(&mut self, sample: TrajectorySample) {
        self.samples.push(sample);
    }

    /// Append every sample of `other`
    pub fn append(&mut self, other: Trajectory) {
        self.samples.extend(other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&TrajectorySample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TrajectorySample> {
        self.samples.last()
    }

    /// State of the final sample, if any
    pub fn final_state(&self) -> Option<KinematicState> {
        self.samples.last().map(TrajectorySample::state)
    }

    /// Total time spanned by the samples (seconds)
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 * self.time_step
    }

    pub fn positions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.position).collect()
    }

    pub fn velocities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.velocity).collect()
    }

    pub fn accelerations(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.acceleration).collect()
    }

    pub fn jerks(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.jerk).collect()
    }

    /// Reflect every sample through the origin
    pub fn mirrored(self) -> Self {
        Self {
            time_step: self.time_step,
            samples: self.samples.iter().map(TrajectorySample::mirrored).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_is_semi_implicit() {
        let state = KinematicState::at_rest(0.0).step(1.0, 0.1);
        assert!((state.acceleration - 0.1).abs() < 1e-12);
        assert!((state.velocity - 0.01).abs() < 1e-12);
        assert!((state.position - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_zero_jerk_at_rest_is_fixed_point() {
        let state = KinematicState::at_rest(1.5);
        assert_eq!(state.step(0.0, 0.01), state);
    }

    #[test]
    fn test_sequences_have_equal_length() {
        let mut trajectory = Trajectory::new(0.01);
        let mut state = KinematicState::at_rest(0.0);
        for _ in 0..5 {
            state = state.step(1.0, 0.01);
            trajectory.push(TrajectorySample::new(state, 1.0));
        }
        assert_eq!(trajectory.positions().len(), 5);
        assert_eq!(trajectory.velocities().len(), 5);
        assert_eq!(trajectory.accelerations().len(), 5);
        assert_eq!(trajectory.jerks().len(), 5);
        assert!((trajectory.duration() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_mirrored_trajectory() {
        let mut trajectory = Trajectory::new(0.01);
        trajectory.push(TrajectorySample::new(KinematicState::new(1.0, 2.0, 3.0), 1.0));
        let mirrored = trajectory.mirrored();
        let sample = mirrored.last().unwrap();
        assert_eq!(sample.position, -1.0);
        assert_eq!(sample.velocity, -2.0);
        assert_eq!(sample.acceleration, -3.0);
        assert_eq!(sample.jerk, -1.0);
    }
}
