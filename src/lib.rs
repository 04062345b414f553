// traj-rs: jerk-limited motion profiles for a single scalar degree of freedom

pub mod config;
pub mod motion;

pub use config::{Config, ConfigError, load_config};
pub use motion::oracle::{FeasibilityOracle, KinematicLimits};
pub use motion::planner::{DiscretePlanner, PlanError, PlanOutcome, RejectReason, Rejection, Thresholds};
pub use motion::planner::stopping::StoppingPlanner;
pub use motion::segments::{BoundaryConditions, JerkPattern, JerkSign, SegmentSolution, SegmentSolver, SolverConfig};
pub use motion::trajectory::{KinematicState, Trajectory, TrajectorySample};
