// src/motion/segments/mod.rs - Segment durations for a fixed jerk-sign pattern
//
// A segmented profile is a sequence of constant-jerk phases whose jerk is
// +j_max, 0 or -j_max. Given the sign pattern and both boundary states, the
// solver finds non-negative phase durations that connect them.

mod closed_form;
pub mod equations;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::motion::planner::PlanError;
use crate::motion::trajectory::KinematicState;
use equations::{MotionEquationTable, MotionEquations};

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JerkSign {
    Positive,
    Zero,
    Negative,
}

impl JerkSign {
    pub fn value(self) -> f64 {
        match self {
            JerkSign::Positive => 1.0,
            JerkSign::Zero => 0.0,
            JerkSign::Negative => -1.0,
        }
    }

    fn symbol(self) -> char {
        match self {
            JerkSign::Positive => '+',
            JerkSign::Zero => '0',
            JerkSign::Negative => '-',
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("jerk pattern is empty")]
    Empty,
    #[error("invalid jerk sign: {0}")]
    InvalidSign(String),
}

/// Ordered jerk signs, one per segment.
///
/// Parses from compact form (`"+-+"`, `"+0-"`) or comma-separated numbers
/// (`"1,-1,1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JerkPattern(Vec<JerkSign>);

impl JerkPattern {
    pub fn new(signs: Vec<JerkSign>) -> Result<Self, PatternError> {
        if signs.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self(signs))
    }

    /// The accelerate, adjust, settle pattern `[+, -, +]`
    pub fn accel_limited() -> Self {
        Self(vec![JerkSign::Positive, JerkSign::Negative, JerkSign::Positive])
    }

    /// Every pattern with `len` segments
    pub fn all_of_length(len: usize) -> impl Iterator<Item = JerkPattern> {
        const SIGNS: [JerkSign; 3] = [JerkSign::Positive, JerkSign::Zero, JerkSign::Negative];
        let count = 3usize.pow(len as u32);
        (0..count).map(move |mut index| {
            let mut signs = Vec::with_capacity(len);
            for _ in 0..len {
                signs.push(SIGNS[index % 3]);
                index /= 3;
            }
            JerkPattern(signs)
        })
    }

    pub fn signs(&self) -> &[JerkSign] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JerkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sign in &self.0 {
            write!(f, "{}", sign.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for JerkPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let signs = if s.contains(',') {
            s.split(',')
                .map(|token| match token.trim() {
                    "+" | "1" | "+1" => Ok(JerkSign::Positive),
                    "0" => Ok(JerkSign::Zero),
                    "-" | "-1" => Ok(JerkSign::Negative),
                    other => Err(PatternError::InvalidSign(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| match c {
                    '+' => Ok(JerkSign::Positive),
                    '0' => Ok(JerkSign::Zero),
                    '-' => Ok(JerkSign::Negative),
                    other => Err(PatternError::InvalidSign(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::new(signs)
    }
}

/// Start and end states of a segmented profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConditions {
    pub start: KinematicState,
    pub end: KinematicState,
}

impl BoundaryConditions {
    pub fn new(start: KinematicState, end: KinematicState) -> Self {
        Self { start, end }
    }
}

/// Root-finding settings for [`SegmentSolver`]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SolverConfig {
    /// Largest accepted |residual| in each of position, velocity, acceleration
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Iterations per random restart
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_restarts")]
    pub restarts: usize,

    /// Seed for initial guesses; drawn from the OS when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            restarts: default_restarts(),
            seed: None,
        }
    }
}

fn default_tolerance() -> f64 { 1e-9 }
fn default_max_iterations() -> usize { 100 }
fn default_restarts() -> usize { 8 }

/// Durations found by a successful solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSolution {
    /// One non-negative duration per pattern entry (seconds)
    pub durations: Vec<f64>,
    pub iterations: usize,
    /// Largest |achieved - target| over position, velocity, acceleration
    pub residual: f64,
}

impl SegmentSolution {
    pub fn total_duration(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// Finds segment durations for a jerk pattern and boundary conditions.
///
/// Durations are parameterised as squares, δ = x², so every real solution is
/// non-negative. The residual is driven to zero with damped Gauss-Newton
/// (Levenberg-Marquardt) steps from random starting points.
#[derive(Debug, Clone)]
pub struct SegmentSolver {
    max_jerk: f64,
    max_acceleration: f64,
    config: SolverConfig,
    table: MotionEquationTable,
}

impl SegmentSolver {
    pub fn new(max_jerk: f64, max_acceleration: f64, config: SolverConfig) -> Result<Self, PlanError> {
        if !(max_jerk.is_finite() && max_jerk > 0.0) {
            return Err(PlanError::InvalidParameters(format!("max jerk must be > 0, got {}", max_jerk)));
        }
        if !(max_acceleration.is_finite() && max_acceleration > 0.0) {
            return Err(PlanError::InvalidParameters(format!(
                "max acceleration must be > 0, got {}",
                max_acceleration
            )));
        }
        if !(config.tolerance > 0.0) {
            return Err(PlanError::InvalidParameters(format!("tolerance must be > 0, got {}", config.tolerance)));
        }
        Ok(Self {
            max_jerk,
            max_acceleration,
            config,
            table: MotionEquationTable::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PlanError> {
        Self::new(config.limits.max_jerk, config.limits.max_acceleration, config.solver)
    }

    /// Equations for `pattern`, from the table when precomputed
    pub fn equations(&self, pattern: &JerkPattern) -> Cow<'_, MotionEquations> {
        match self.table.get(pattern) {
            Some(equations) => Cow::Borrowed(equations),
            None => {
                tracing::debug!("generating motion equations for pattern {}", pattern);
                Cow::Owned(MotionEquations::generate(pattern))
            }
        }
    }

    /// Solve with initial guesses from the configured seed, or from OS entropy
    pub fn solve(&self, pattern: &JerkPattern, boundary: &BoundaryConditions) -> Result<SegmentSolution, PlanError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        self.solve_with_rng(pattern, boundary, &mut rng)
    }

    pub fn solve_with_rng<R: Rng>(
        &self,
        pattern: &JerkPattern,
        boundary: &BoundaryConditions,
        rng: &mut R,
    ) -> Result<SegmentSolution, PlanError> {
        check_boundary(boundary)?;
        let equations = self.equations(pattern);
        let segments = pattern.len();

        let mut iterations = 0;
        let mut last_residual = f64::INFINITY;

        for restart in 0..self.config.restarts {
            let mut x = DVector::from_fn(segments, |_, _| rng.random_range(0.1..2.0));
            let mut residual = self.residual(&equations, &x, boundary);
            let mut cost = residual.norm_squared();
            let mut damping = INITIAL_DAMPING;

            for _ in 0..self.config.max_iterations {
                iterations += 1;
                if residual.iter().any(|r| !r.is_finite()) {
                    break;
                }
                let error = residual.amax();
                if error <= self.config.tolerance {
                    let durations: Vec<f64> = x.iter().map(|xi| xi * xi).collect();
                    tracing::debug!(
                        "pattern {} solved after {} iterations ({} restarts): {:?}",
                        pattern,
                        iterations,
                        restart,
                        durations
                    );
                    return Ok(SegmentSolution {
                        durations,
                        iterations,
                        residual: error,
                    });
                }

                let jacobian = self.jacobian(&equations, &x, boundary);
                let normal = jacobian.transpose() * &jacobian;
                let gradient = jacobian.transpose() * &residual;
                let mut damped = normal.clone();
                for i in 0..segments {
                    damped[(i, i)] += damping * normal[(i, i)].max(MIN_DAMPING);
                }
                let Some(step) = damped.lu().solve(&(-gradient)) else {
                    break;
                };

                let candidate = &x + step;
                let candidate_residual = self.residual(&equations, &candidate, boundary);
                let candidate_cost = candidate_residual.norm_squared();
                if candidate_cost < cost {
                    x = candidate;
                    residual = candidate_residual;
                    cost = candidate_cost;
                    damping = (damping / 10.0).max(MIN_DAMPING);
                } else {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        break;
                    }
                }
            }

            last_residual = if residual.iter().all(|r| r.is_finite()) {
                residual.amax()
            } else {
                f64::NAN
            };
            tracing::trace!("restart {} for pattern {} ended at residual {:e}", restart, pattern, last_residual);
        }

        tracing::warn!("pattern {} did not converge after {} iterations", pattern, iterations);
        Err(PlanError::SolverDidNotConverge {
            iterations,
            residual: last_residual,
        })
    }

    /// Analytic solve for the `[+, -, +]` pattern
    pub fn solve_accel_limited(&self, boundary: &BoundaryConditions) -> Result<SegmentSolution, PlanError> {
        check_boundary(boundary)?;
        let pattern = JerkPattern::accel_limited();
        let equations = self.equations(&pattern);
        closed_form::solve(
            &equations,
            self.max_jerk,
            self.max_acceleration,
            boundary,
            self.config.tolerance,
            self.config.max_iterations,
        )
    }

    /// Achieved minus target end state at durations `x²`
    fn residual(&self, equations: &MotionEquations, x: &DVector<f64>, boundary: &BoundaryConditions) -> DVector<f64> {
        let durations: Vec<f64> = x.iter().map(|xi| xi * xi).collect();
        let reached = equations.evaluate(&durations, self.max_jerk, &boundary.start);
        DVector::from_column_slice(&[
            reached.position - boundary.end.position,
            reached.velocity - boundary.end.velocity,
            reached.acceleration - boundary.end.acceleration,
        ])
    }

    /// Chain rule through δ = x²: d/dx = d/dδ · 2x
    fn jacobian(&self, equations: &MotionEquations, x: &DVector<f64>, boundary: &BoundaryConditions) -> DMatrix<f64> {
        let durations: Vec<f64> = x.iter().map(|xi| xi * xi).collect();
        let mut jacobian = equations.jacobian(&durations, self.max_jerk, &boundary.start);
        for (col, xi) in x.iter().enumerate() {
            jacobian.column_mut(col).scale_mut(2.0 * xi);
        }
        jacobian
    }
}

fn check_boundary(boundary: &BoundaryConditions) -> Result<(), PlanError> {
    if boundary.start.is_finite() && boundary.end.is_finite() {
        Ok(())
    } else {
        Err(PlanError::InvalidParameters(format!("boundary states must be finite: {:?}", boundary)))
    }
}
