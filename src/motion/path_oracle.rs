// src/motion/path_oracle.rs - Joint-space limits for a path parameter s(t)
//
// For a joint path q(s), the time derivatives of q follow from the derivatives
// of q with respect to s and of s with respect to t (see Debrouwere et al.,
// "Time-Optimal Path Following for Robots with Trajectory Jerk Constraints
// using Sequential Convex Programming", eqs. 3 and 10).

use crate::motion::oracle::FeasibilityOracle;
use crate::motion::trajectory::KinematicState;

/// `[q(s), dq/ds, d²q/ds², d³q/ds³]` for one joint
pub type PathDerivatives = [f64; 4];

/// Combine path derivatives with `[s, ds/dt, d²s/dt², d³s/dt³]` into
/// `[q, dq/dt, d²q/dt², d³q/dt³]`.
pub fn chain_rule(path: &PathDerivatives, state: &[f64; 4]) -> [f64; 4] {
    let [q, dq, ddq, dddq] = *path;
    let [_, s_dot, s_ddot, s_dddot] = *state;
    [
        q,
        dq * s_dot,
        ddq * s_dot * s_dot + dq * s_ddot,
        dddq * s_dot.powi(3) + 3.0 * ddq * s_ddot * s_dot + dq * s_dddot,
    ]
}

/// Lower and upper bounds on one joint's position, velocity, acceleration and jerk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub min: [f64; 4],
    pub max: [f64; 4],
}

impl JointLimits {
    /// Position range plus symmetric velocity/acceleration/jerk limits
    pub fn symmetric(position: (f64, f64), max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            min: [position.0, -max_velocity, -max_acceleration, -max_jerk],
            max: [position.1, max_velocity, max_acceleration, max_jerk],
        }
    }

    fn contains(&self, values: &[f64; 4]) -> bool {
        values
            .iter()
            .zip(self.min.iter().zip(self.max.iter()))
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

/// Oracle over the path parameter that checks every joint of a path against
/// its limits.
///
/// `path` returns one [`PathDerivatives`] per joint for a given `s`, in the
/// same order as `limits`.
pub struct JointSpaceOracle<F> {
    path: F,
    limits: Vec<JointLimits>,
}

impl<F> JointSpaceOracle<F>
where
    F: Fn(f64) -> Vec<PathDerivatives>,
{
    pub fn new(path: F, limits: Vec<JointLimits>) -> Self {
        Self { path, limits }
    }

    pub fn joint_count(&self) -> usize {
        self.limits.len()
    }
}

impl<F> FeasibilityOracle for JointSpaceOracle<F>
where
    F: Fn(f64) -> Vec<PathDerivatives>,
{
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool {
        let s_state = [state.position, state.velocity, state.acceleration, jerk];
        let joints = (self.path)(state.position);
        if joints.len() != self.limits.len() {
            tracing::warn!(
                "path returned {} joints, limits cover {}",
                joints.len(),
                self.limits.len()
            );
            return false;
        }
        joints
            .iter()
            .zip(&self.limits)
            .all(|(derivatives, limits)| limits.contains(&chain_rule(derivatives, &s_state)))
    }
}
