// src/motion/segments/closed_form.rs - Analytic path for the [+,-,+] pattern
//
// With jerk signs [+j, -j, +j] the end acceleration is linear in the segment
// durations and the end velocity is quadratic in δ1 once δ0 is eliminated.
// That leaves end position as a monotonic function of δ2, found by bisection
// over [0, 2·a_max/j].

use crate::motion::planner::PlanError;
use crate::motion::segments::equations::MotionEquations;
use crate::motion::segments::{BoundaryConditions, SegmentSolution};

/// Non-negative (δ0, δ1) meeting the end velocity and acceleration for a
/// given δ2, preferring the larger root of δ1
fn leading_durations(delta_2: f64, max_jerk: f64, boundary: &BoundaryConditions) -> Option<(f64, f64)> {
    let start = &boundary.start;
    let end = &boundary.end;
    let j = max_jerk;

    // a_end = a0 + j·(δ0 - δ1 + δ2)  =>  δ0 = c + δ1 - δ2
    let c = (end.acceleration - start.acceleration) / j;
    let k = start.velocity - end.velocity + start.acceleration * c + 0.5 * j * c * c;
    let b = j * (c - delta_2) + start.acceleration;
    let discriminant = b * b - j * k;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    [(-b + root) / j, (-b - root) / j]
        .into_iter()
        .map(|delta_1| (c + delta_1 - delta_2, delta_1))
        .find(|(delta_0, delta_1)| *delta_0 >= 0.0 && *delta_1 >= 0.0)
}

pub(crate) fn solve(
    equations: &MotionEquations,
    max_jerk: f64,
    max_acceleration: f64,
    boundary: &BoundaryConditions,
    tolerance: f64,
    max_iterations: usize,
) -> Result<SegmentSolution, PlanError> {
    let target = boundary.end.position;
    let evaluate = |delta_2: f64| -> Result<([f64; 3], f64), PlanError> {
        let (delta_0, delta_1) =
            leading_durations(delta_2, max_jerk, boundary).ok_or(PlanError::NoValidRoots { delta_2 })?;
        let durations = [delta_0, delta_1, delta_2];
        let reached = equations.evaluate(&durations, max_jerk, &boundary.start);
        Ok((durations, reached.position))
    };
    let finish = |durations: [f64; 3], iterations: usize| {
        let reached = equations.evaluate(&durations, max_jerk, &boundary.start);
        let residual = (reached.position - boundary.end.position)
            .abs()
            .max((reached.velocity - boundary.end.velocity).abs())
            .max((reached.acceleration - boundary.end.acceleration).abs());
        tracing::debug!("closed-form [+,-,+] solved in {} bisection steps: {:?}", iterations, durations);
        SegmentSolution {
            durations: durations.to_vec(),
            iterations,
            residual,
        }
    };

    let mut lo = 0.0;
    let mut hi = 2.0 * max_acceleration / max_jerk;

    // δ2 = 0 is the lower end of the bracket and solves rest-to-rest exactly.
    if let Ok((durations, position)) = evaluate(lo) {
        if (position - target).abs() <= tolerance {
            return Ok(finish(durations, 0));
        }
    }

    let mut position = f64::NAN;
    for iteration in 1..=max_iterations {
        let mid = 0.5 * (lo + hi);
        let (durations, reached) = evaluate(mid)?;
        position = reached;
        if (position - target).abs() <= tolerance {
            return Ok(finish(durations, iteration));
        }
        if position < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    tracing::warn!("closed-form bisection stopped at position {} (target {})", position, target);
    Err(PlanError::SolverDidNotConverge {
        iterations: max_iterations,
        residual: (position - target).abs(),
    })
}
