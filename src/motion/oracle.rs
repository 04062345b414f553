// src/motion/oracle.rs - Feasibility predicates consulted by the planners
use serde::{Deserialize, Serialize};

use crate::motion::trajectory::KinematicState;

/// Decides whether an instantaneous state and jerk command lie within limits.
///
/// Implementations must be pure: the planners call this many times per step
/// and never cache the answers.
pub trait FeasibilityOracle {
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool;
}

/// Any `fn(position, velocity, acceleration, jerk) -> bool` is an oracle
impl<F> FeasibilityOracle for F
where
    F: Fn(f64, f64, f64, f64) -> bool,
{
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool {
        self(state.position, state.velocity, state.acceleration, jerk)
    }
}

/// Symmetric box limits on velocity, acceleration and jerk, with an optional
/// position range
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct KinematicLimits {
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,

    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f64,

    #[serde(default = "default_max_jerk")]
    pub max_jerk: f64,

    #[serde(default)]
    pub min_position: Option<f64>,

    #[serde(default)]
    pub max_position: Option<f64>,
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            max_acceleration: default_max_acceleration(),
            max_jerk: default_max_jerk(),
            min_position: None,
            max_position: None,
        }
    }
}

impl KinematicLimits {
    pub fn new(max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
            max_jerk,
            min_position: None,
            max_position: None,
        }
    }

    pub fn with_position_range(mut self, min: f64, max: f64) -> Self {
        self.min_position = Some(min);
        self.max_position = Some(max);
        self
    }

    fn position_ok(&self, position: f64) -> bool {
        self.min_position.is_none_or(|min| position >= min)
            && self.max_position.is_none_or(|max| position <= max)
    }
}

impl FeasibilityOracle for KinematicLimits {
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool {
        self.position_ok(state.position)
            && state.velocity.abs() <= self.max_velocity
            && state.acceleration.abs() <= self.max_acceleration
            && jerk.abs() <= self.max_jerk
    }
}

/// Rejects every position above `limit` before consulting the wrapped oracle.
///
/// The goal planner wraps its oracle in this so that the stopping trajectory
/// spliced onto the end of a plan cannot carry the motion past the goal.
pub struct GoalBound<'a, O: ?Sized> {
    inner: &'a O,
    limit: f64,
}

impl<'a, O: FeasibilityOracle + ?Sized> GoalBound<'a, O> {
    pub fn new(inner: &'a O, limit: f64) -> Self {
        Self { inner, limit }
    }
}

impl<O: FeasibilityOracle + ?Sized> FeasibilityOracle for GoalBound<'_, O> {
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool {
        state.position <= self.limit && self.inner.is_valid(state, jerk)
    }
}

/// Presents the wrapped oracle in reflected coordinates, so a move toward a
/// lower position can be planned as a forward move
pub struct Mirrored<'a, O: ?Sized> {
    inner: &'a O,
}

impl<'a, O: FeasibilityOracle + ?Sized> Mirrored<'a, O> {
    pub fn new(inner: &'a O) -> Self {
        Self { inner }
    }
}

impl<O: FeasibilityOracle + ?Sized> FeasibilityOracle for Mirrored<'_, O> {
    fn is_valid(&self, state: &KinematicState, jerk: f64) -> bool {
        self.inner.is_valid(&state.mirrored(), -jerk)
    }
}

fn default_max_velocity() -> f64 { 2.0 }
fn default_max_acceleration() -> f64 { 3.0 }
fn default_max_jerk() -> f64 { 1.0 }
