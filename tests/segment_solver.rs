// Integration tests for the segment duration solver and motion equations

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use traj_rs::motion::segments::equations::MotionEquations;
    use traj_rs::{BoundaryConditions, JerkPattern, KinematicState, PlanError, SegmentSolver, SolverConfig};

    fn solver() -> SegmentSolver {
        SegmentSolver::new(1.0, 3.0, SolverConfig::default()).unwrap()
    }

    fn from_rest(end: KinematicState) -> BoundaryConditions {
        BoundaryConditions::new(KinematicState::at_rest(0.0), end)
    }

    fn assert_reaches(solver: &SegmentSolver, pattern: &JerkPattern, boundary: &BoundaryConditions, durations: &[f64]) {
        assert!(durations.iter().all(|d| *d >= 0.0), "negative duration in {:?}", durations);
        let reached = solver.equations(pattern).evaluate(durations, 1.0, &boundary.start);
        assert!((reached.position - boundary.end.position).abs() <= 1e-8, "{:?}", reached);
        assert!((reached.velocity - boundary.end.velocity).abs() <= 1e-8, "{:?}", reached);
        assert!((reached.acceleration - boundary.end.acceleration).abs() <= 1e-8, "{:?}", reached);
    }

    #[test]
    fn test_zero_displacement_gives_zero_durations() {
        let solver = solver();
        let boundary = from_rest(KinematicState::at_rest(0.0));

        let closed = solver.solve_accel_limited(&boundary).unwrap();
        assert_eq!(closed.durations, vec![0.0, 0.0, 0.0]);

        let pattern = JerkPattern::accel_limited();
        let mut rng = StdRng::seed_from_u64(3);
        let newton = solver.solve_with_rng(&pattern, &boundary, &mut rng).unwrap();
        assert!(newton.residual <= SolverConfig::default().tolerance);
        assert_reaches(&solver, &pattern, &boundary, &newton.durations);
        assert!(newton.total_duration() < 0.01, "{:?}", newton.durations);
    }

    #[test]
    fn test_single_segment_scenario() {
        let solver = solver();
        let pattern: JerkPattern = "+".parse().unwrap();
        let boundary = from_rest(KinematicState::new(1.0 / 6.0, 0.5, 1.0));
        let solution = solver.solve(&pattern, &boundary).unwrap();
        assert!((solution.durations[0] - 1.0).abs() < 1e-6);
        assert_reaches(&solver, &pattern, &boundary, &solution.durations);

        let equations = MotionEquations::generate(&pattern);
        assert_eq!(equations.evaluate(&[0.0], 1.0, &boundary.start), KinematicState::at_rest(0.0));
        let at_two = equations.evaluate(&[2.0], 1.0, &boundary.start);
        assert!((at_two.position - 4.0 / 3.0).abs() < 1e-12);
        assert!((at_two.velocity - 2.0).abs() < 1e-12);
        assert!((at_two.acceleration - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_segment_scenario() {
        let solver = solver();
        let pattern: JerkPattern = "1,-1".parse().unwrap();
        let reached = solver.equations(&pattern).evaluate(&[1.0, 2.0], 1.0, &KinematicState::at_rest(0.0));
        assert!((reached.position - 11.0 / 6.0).abs() < 1e-12);
        assert!((reached.velocity - 0.5).abs() < 1e-12);
        assert!((reached.acceleration + 1.0).abs() < 1e-12);

        let boundary = from_rest(KinematicState::new(11.0 / 6.0, 0.5, -1.0));
        let solution = solver.solve(&pattern, &boundary).unwrap();
        assert_reaches(&solver, &pattern, &boundary, &solution.durations);
    }

    #[test]
    fn test_solutions_from_different_seeds_both_satisfy() {
        let solver = solver();
        let cases = [
            ("+-+", KinematicState::new(13.0 / 6.0, 1.5, 1.0)),
            ("+-+", KinematicState::at_rest(2.0)),
            ("+0-", KinematicState::new(3.0, 1.0, 0.0)),
        ];
        for (pattern, end) in cases {
            let pattern: JerkPattern = pattern.parse().unwrap();
            let boundary = from_rest(end);
            for seed in [11, 12] {
                let mut rng = StdRng::seed_from_u64(seed);
                let solution = solver.solve_with_rng(&pattern, &boundary, &mut rng).unwrap();
                assert!(solution.residual <= 1e-9);
                assert_reaches(&solver, &pattern, &boundary, &solution.durations);
            }
        }
    }

    #[test]
    fn test_closed_form_agrees_with_newton() {
        let solver = solver();
        let pattern = JerkPattern::accel_limited();
        for end in [KinematicState::at_rest(2.0), KinematicState::new(13.0 / 6.0, 1.5, 1.0)] {
            let boundary = from_rest(end);
            let closed = solver.solve_accel_limited(&boundary).unwrap();
            let mut rng = StdRng::seed_from_u64(5);
            let newton = solver.solve_with_rng(&pattern, &boundary, &mut rng).unwrap();
            for (a, b) in closed.durations.iter().zip(&newton.durations) {
                assert!((a - b).abs() < 1e-4, "closed {:?} vs newton {:?}", closed.durations, newton.durations);
            }
        }

        let rest_to_rest = solver.solve_accel_limited(&from_rest(KinematicState::at_rest(2.0))).unwrap();
        let expected = [1.0, 2.0, 1.0];
        for (d, e) in rest_to_rest.durations.iter().zip(expected) {
            assert!((d - e).abs() < 1e-6);
        }
        assert!((rest_to_rest.total_duration() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_form_without_valid_roots() {
        // Ending with backward velocity from rest has no non-negative
        // durations once the bisection narrows δ2.
        let solver = solver();
        let boundary = from_rest(KinematicState::new(1.0, -1.0, 0.0));
        match solver.solve_accel_limited(&boundary) {
            Err(PlanError::NoValidRoots { delta_2 }) => assert!(delta_2 > 0.0 && delta_2 < 6.0),
            other => panic!("expected NoValidRoots, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_form_target_beyond_bracket() {
        // δ2 <= 2·a_max/j = 6 reaches at most position 432 rest to rest.
        let solver = solver();
        let boundary = from_rest(KinematicState::at_rest(1000.0));
        match solver.solve_accel_limited(&boundary) {
            Err(PlanError::SolverDidNotConverge { iterations, residual }) => {
                assert_eq!(iterations, SolverConfig::default().max_iterations);
                assert!(residual > 500.0, "residual {}", residual);
            }
            other => panic!("expected SolverDidNotConverge, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_target_reports_non_convergence() {
        // A single positive-jerk segment from rest can never end with
        // negative acceleration.
        let config = SolverConfig {
            restarts: 2,
            max_iterations: 20,
            ..SolverConfig::default()
        };
        let solver = SegmentSolver::new(1.0, 3.0, config).unwrap();
        let boundary = from_rest(KinematicState::new(0.0, 0.0, -1.0));
        let err = solver.solve(&"+".parse().unwrap(), &boundary).unwrap_err();
        assert!(matches!(err, PlanError::SolverDidNotConverge { .. }), "{err}");
    }

    #[test]
    fn test_non_finite_boundary_is_rejected() {
        let solver = solver();
        let boundary = from_rest(KinematicState::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(
            solver.solve(&JerkPattern::accel_limited(), &boundary),
            Err(PlanError::InvalidParameters(_))
        ));
        assert!(matches!(
            solver.solve_accel_limited(&boundary),
            Err(PlanError::InvalidParameters(_))
        ));
    }
}
