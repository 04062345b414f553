// Integration tests for the discrete-time goal and stopping planners

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use traj_rs::motion::path_oracle::{JointLimits, JointSpaceOracle};
    use traj_rs::{
        DiscretePlanner, FeasibilityOracle, KinematicLimits, KinematicState, PlanError, Trajectory, load_config,
    };

    const TOLERANCE: f64 = 0.01;

    fn limits() -> KinematicLimits {
        KinematicLimits::new(2.0, 3.0, 1.0)
    }

    fn assert_at_rest_near(trajectory: &Trajectory, goal: f64) {
        let end = trajectory.final_state().unwrap();
        assert!((end.position - goal).abs() <= TOLERANCE, "final position {}", end.position);
        assert!(end.velocity.abs() <= TOLERANCE, "final velocity {}", end.velocity);
        assert!(end.acceleration.abs() <= TOLERANCE, "final acceleration {}", end.acceleration);
    }

    fn assert_all_valid<O: FeasibilityOracle + ?Sized>(trajectory: &Trajectory, oracle: &O) {
        for (i, sample) in trajectory.samples().iter().enumerate() {
            assert!(oracle.is_valid(&sample.state(), sample.jerk), "sample {} violates limits: {:?}", i, sample);
        }
    }

    #[test]
    fn test_rest_to_rest_move() {
        let limits = limits();
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        let trajectory = planner.plan(0.0, 2.0, &limits).unwrap();

        assert_eq!(trajectory.first().unwrap().state(), KinematicState::at_rest(0.0));
        assert_at_rest_near(&trajectory, 2.0);
        assert_all_valid(&trajectory, &limits);
        assert!(trajectory.positions().iter().all(|p| *p <= 2.0 + TOLERANCE));
    }

    #[test]
    fn test_various_time_steps_and_goals() {
        let limits = limits();
        for time_step in [0.05, 0.02, 0.01] {
            let planner = DiscretePlanner::new(1.0, time_step).unwrap();
            for goal in [0.5, 2.0, 10.0] {
                let trajectory = planner.plan(0.0, goal, &limits).unwrap();
                assert_at_rest_near(&trajectory, goal);
                assert_all_valid(&trajectory, &limits);
            }
        }
    }

    #[test]
    fn test_oracle_rejecting_all_jerk_fails_first_step() {
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        let no_jerk = |_p: f64, _v: f64, _a: f64, j: f64| j == 0.0;
        match planner.plan(0.0, 2.0, &no_jerk) {
            Err(PlanError::InfeasibleStep { step, rejections }) => {
                assert_eq!(step, 1);
                assert_eq!(rejections.len(), 3);
            }
            other => panic!("expected InfeasibleStep, got {:?}", other),
        }

        // Already at the goal there is nothing to do.
        let trajectory = planner.plan(2.0, 2.0, &no_jerk).unwrap();
        assert_eq!(trajectory.len(), 1);
    }

    #[test]
    fn test_negative_goal_mirrors_forward_plan() {
        let limits = limits();
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        let down = planner.plan(0.0, -1.0, &limits).unwrap();
        let up = planner.plan(0.0, 1.0, &limits).unwrap();

        assert_at_rest_near(&down, -1.0);
        assert_all_valid(&down, &limits);
        assert_eq!(down, up.mirrored());
    }

    #[test]
    fn test_asymmetric_oracle_below_start() {
        // Position floor only matters when moving down.
        let limits = limits().with_position_range(-0.75, 5.0);
        let planner = DiscretePlanner::new(1.0, 0.02).unwrap();
        let trajectory = planner.plan(0.0, -0.5, &limits).unwrap();
        assert_at_rest_near(&trajectory, -0.5);
        assert_all_valid(&trajectory, &limits);
    }

    #[test]
    fn test_stopping_trajectory_is_idempotent() {
        let limits = limits();
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        let stopping = planner.stopping_planner(&limits);
        for start in [
            KinematicState::new(0.0, 0.5, 0.2),
            KinematicState::new(0.0, 1.0, 0.0),
            KinematicState::new(0.0, 1.5, -0.5),
            KinematicState::new(1.0, 0.3, 1.0),
            KinematicState::new(0.0, 2.0, 0.0),
            KinematicState::new(0.0, -1.0, 0.0),
            KinematicState::new(0.0, 0.0, 1.0),
        ] {
            let trajectory = stopping.plan(start).unwrap();
            assert_all_valid(&trajectory, &limits);
            let end = trajectory.final_state().unwrap();
            assert!(end.velocity.abs() <= TOLERANCE, "{:?} stops at {:?}", start, end);
            assert!(end.acceleration.abs() <= TOLERANCE, "{:?} stops at {:?}", start, end);
            assert!(stopping.plan(end).unwrap().is_empty());
        }
    }

    #[test]
    fn test_stopping_beyond_limits_is_infeasible() {
        let limits = limits();
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        // Accelerating hard just under the velocity limit: the limit is
        // crossed before acceleration can be brought down.
        let result = planner.stopping_planner(&limits).plan(KinematicState::new(0.0, 1.9, 2.0));
        match result {
            Err(e @ PlanError::NoBrakingCommand { .. }) => assert!(e.is_infeasible()),
            other => panic!("expected NoBrakingCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_between_steps() {
        let planner = DiscretePlanner::new(1.0, 0.01).unwrap();
        let checks = Cell::new(0);
        let cancel_after_ten = || {
            checks.set(checks.get() + 1);
            checks.get() > 10
        };
        let result = planner.plan_cancellable(0.0, 2.0, &limits(), &cancel_after_ten);
        assert_eq!(result, Err(PlanError::Cancelled { step: 11 }));
    }

    #[test]
    fn test_detailed_plan_exposes_stopping_cache() {
        let planner = DiscretePlanner::new(1.0, 0.02).unwrap();
        let outcome = planner.plan_detailed(0.0, 0.5, &limits()).unwrap();
        let steps: Vec<usize> = outcome.stopping_trajectories.keys().copied().collect();
        assert_eq!(steps, (1..=steps.len()).collect::<Vec<_>>());
        assert_at_rest_near(&outcome.trajectory, 0.5);
    }

    #[test]
    fn test_joint_space_oracle_limits_path_speed() {
        // q(s) = 2s: the path parameter may move at half the joint limits.
        let oracle = JointSpaceOracle::new(
            |s: f64| vec![[2.0 * s, 2.0, 0.0, 0.0]],
            vec![JointLimits::symmetric((0.0, 10.0), 1.0, 1.0, 1.0)],
        );
        let planner = DiscretePlanner::new(0.5, 0.01).unwrap();
        let trajectory = planner.plan(0.0, 1.0, &oracle).unwrap();
        assert_at_rest_near(&trajectory, 1.0);
        assert!(trajectory.velocities().iter().all(|v| v.abs() <= 0.5));
    }

    #[test]
    fn test_sample_config_drives_planner() {
        let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/planner.toml")).unwrap();
        let planner = DiscretePlanner::from_config(&config).unwrap();
        let trajectory = planner.plan(0.0, 2.0, &config.limits).unwrap();
        assert_at_rest_near(&trajectory, 2.0);
    }
}
