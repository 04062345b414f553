// src/motion/segments/equations.rs - Symbolic end-state equations per jerk pattern
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::{Add, Mul};

use nalgebra::DMatrix;

use crate::motion::segments::JerkPattern;
use crate::motion::trajectory::KinematicState;

/// Longest pattern whose equations are built when a table is created
pub const PRECOMPUTED_PATTERN_LENGTH: usize = 3;

/// Sparse multivariate polynomial with real coefficients.
///
/// Each term is keyed by its exponent vector, one entry per variable.
/// Terms whose coefficient becomes exactly zero are dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polynomial {
    variables: usize,
    terms: BTreeMap<Vec<u32>, f64>,
}

impl Polynomial {
    pub fn zero(variables: usize) -> Self {
        Self {
            variables,
            terms: BTreeMap::new(),
        }
    }

    pub fn constant(variables: usize, value: f64) -> Self {
        let mut polynomial = Self::zero(variables);
        polynomial.add_term(vec![0; variables], value);
        polynomial
    }

    /// The polynomial `x_index`
    pub fn variable(variables: usize, index: usize) -> Self {
        let mut exponents = vec![0; variables];
        exponents[index] = 1;
        let mut polynomial = Self::zero(variables);
        polynomial.add_term(exponents, 1.0);
        polynomial
    }

    pub fn variables(&self) -> usize {
        self.variables
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Highest total degree over all terms
    pub fn degree(&self) -> u32 {
        self.terms
            .keys()
            .map(|exponents| exponents.iter().sum())
            .max()
            .unwrap_or(0)
    }

    pub fn scale(&self, factor: f64) -> Self {
        let mut scaled = Self::zero(self.variables);
        for (exponents, coefficient) in &self.terms {
            scaled.add_term(exponents.clone(), coefficient * factor);
        }
        scaled
    }

    /// Partial derivative with respect to variable `index`
    pub fn derivative(&self, index: usize) -> Self {
        let mut result = Self::zero(self.variables);
        for (exponents, coefficient) in &self.terms {
            let power = exponents[index];
            if power == 0 {
                continue;
            }
            let mut lowered = exponents.clone();
            lowered[index] -= 1;
            result.add_term(lowered, coefficient * power as f64);
        }
        result
    }

    /// Evaluate at `point`; missing trailing coordinates count as zero
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(exponents, coefficient)| {
                exponents
                    .iter()
                    .enumerate()
                    .filter(|(_, power)| **power > 0)
                    .map(|(i, power)| point.get(i).copied().unwrap_or(0.0).powi(*power as i32))
                    .product::<f64>()
                    * coefficient
            })
            .sum()
    }

    fn add_term(&mut self, exponents: Vec<u32>, coefficient: f64) {
        if coefficient == 0.0 {
            return;
        }
        match self.terms.entry(exponents) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += coefficient;
                if *entry.get() == 0.0 {
                    entry.remove();
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(coefficient);
            }
        }
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let mut sum = self.clone();
        sum.variables = sum.variables.max(rhs.variables);
        for (exponents, coefficient) in &rhs.terms {
            sum.add_term(exponents.clone(), *coefficient);
        }
        sum
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let variables = self.variables.max(rhs.variables);
        let mut product = Polynomial::zero(variables);
        for (lhs_exponents, lhs_coefficient) in &self.terms {
            for (rhs_exponents, rhs_coefficient) in &rhs.terms {
                let exponents = (0..variables)
                    .map(|i| lhs_exponents.get(i).copied().unwrap_or(0) + rhs_exponents.get(i).copied().unwrap_or(0))
                    .collect();
                product.add_term(exponents, lhs_coefficient * rhs_coefficient);
            }
        }
        product
    }
}

/// End position, velocity and acceleration of a constant-jerk segment
/// sequence, with their partial derivatives in each segment duration.
///
/// Variables are ordered `[δ0 .. δN-1, j_max, p_start, v_start, a_start]`.
#[derive(Debug, Clone)]
pub struct MotionEquations {
    pattern: JerkPattern,
    end: [Polynomial; 3],
    jacobian: [Vec<Polynomial>; 3],
}

impl MotionEquations {
    /// Integrate the constant-jerk kinematics of every segment symbolically
    pub fn generate(pattern: &JerkPattern) -> Self {
        let segments = pattern.len();
        let variables = segments + 4;
        let max_jerk = Polynomial::variable(variables, segments);

        let mut position = Polynomial::variable(variables, segments + 1);
        let mut velocity = Polynomial::variable(variables, segments + 2);
        let mut acceleration = Polynomial::variable(variables, segments + 3);

        for (i, sign) in pattern.signs().iter().enumerate() {
            let delta = Polynomial::variable(variables, i);
            let delta_sq = &delta * &delta;
            let delta_cu = &delta_sq * &delta;
            let jerk = max_jerk.scale(sign.value());

            let next_position = &(&(&position + &(&velocity * &delta)) + &(&acceleration * &delta_sq).scale(0.5))
                + &(&jerk * &delta_cu).scale(1.0 / 6.0);
            let next_velocity = &(&velocity + &(&acceleration * &delta)) + &(&jerk * &delta_sq).scale(0.5);
            let next_acceleration = &acceleration + &(&jerk * &delta);

            position = next_position;
            velocity = next_velocity;
            acceleration = next_acceleration;
        }

        let end = [position, velocity, acceleration];
        let jacobian: [Vec<Polynomial>; 3] = end
            .each_ref()
            .map(|equation| (0..segments).map(|i| equation.derivative(i)).collect());

        Self {
            pattern: pattern.clone(),
            end,
            jacobian,
        }
    }

    pub fn segments(&self) -> usize {
        self.pattern.len()
    }

    pub fn position(&self) -> &Polynomial {
        &self.end[0]
    }

    pub fn velocity(&self) -> &Polynomial {
        &self.end[1]
    }

    pub fn acceleration(&self) -> &Polynomial {
        &self.end[2]
    }

    fn point(&self, durations: &[f64], max_jerk: f64, start: &KinematicState) -> Vec<f64> {
        let segments = self.segments();
        let mut point = vec![0.0; segments + 4];
        for (slot, duration) in point.iter_mut().zip(durations) {
            *slot = *duration;
        }
        point[segments] = max_jerk;
        point[segments + 1] = start.position;
        point[segments + 2] = start.velocity;
        point[segments + 3] = start.acceleration;
        point
    }

    /// End state reached after running each segment for its duration
    pub fn evaluate(&self, durations: &[f64], max_jerk: f64, start: &KinematicState) -> KinematicState {
        let point = self.point(durations, max_jerk, start);
        KinematicState::new(
            self.end[0].evaluate(&point),
            self.end[1].evaluate(&point),
            self.end[2].evaluate(&point),
        )
    }

    /// 3×N matrix of d(end state)/d(duration)
    pub fn jacobian(&self, durations: &[f64], max_jerk: f64, start: &KinematicState) -> DMatrix<f64> {
        let point = self.point(durations, max_jerk, start);
        DMatrix::from_fn(3, self.segments(), |row, col| self.jacobian[row][col].evaluate(&point))
    }
}

/// Immutable lookup of equations for every pattern up to
/// [`PRECOMPUTED_PATTERN_LENGTH`] segments
#[derive(Debug, Clone)]
pub struct MotionEquationTable {
    equations: HashMap<JerkPattern, MotionEquations>,
}

impl MotionEquationTable {
    pub fn new() -> Self {
        let equations: HashMap<_, _> = (1..=PRECOMPUTED_PATTERN_LENGTH)
            .flat_map(JerkPattern::all_of_length)
            .map(|pattern| {
                let equations = MotionEquations::generate(&pattern);
                (pattern, equations)
            })
            .collect();
        tracing::debug!("precomputed motion equations for {} jerk patterns", equations.len());
        Self { equations }
    }

    pub fn get(&self, pattern: &JerkPattern) -> Option<&MotionEquations> {
        self.equations.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }
}

impl Default for MotionEquationTable {
    fn default() -> Self {
        Self::new()
    }
}
