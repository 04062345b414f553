// src/main.rs - traj-plan command line harness
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use traj_rs::motion::segments::{BoundaryConditions, JerkPattern, SegmentSolver};
use traj_rs::{Config, DiscretePlanner, KinematicState, load_config};

/// Jerk-limited motion planning for a single axis
#[derive(Parser, Debug)]
#[command(name = "traj-plan", about = "Plan jerk-limited motion profiles and print them as JSON.")]
struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log planner decisions to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan from rest at START to rest at GOAL
    Plan {
        #[arg(allow_negative_numbers = true)]
        start: f64,
        #[arg(allow_negative_numbers = true)]
        goal: f64,
    },
    /// Brake from the given state to rest
    Stop {
        #[arg(allow_negative_numbers = true)]
        position: f64,
        #[arg(allow_negative_numbers = true)]
        velocity: f64,
        #[arg(allow_negative_numbers = true)]
        acceleration: f64,
    },
    /// Solve segment durations for a jerk pattern such as "+-+"
    Segments {
        #[arg(allow_hyphen_values = true)]
        pattern: JerkPattern,
        /// Start state as p,v,a
        #[arg(long, value_parser = parse_state, allow_hyphen_values = true, default_value = "0,0,0")]
        start: KinematicState,
        /// End state as p,v,a
        #[arg(long, value_parser = parse_state, allow_hyphen_values = true)]
        end: KinematicState,
        /// Use the analytic solver (pattern must be +-+)
        #[arg(long)]
        closed_form: bool,
    },
}

fn parse_state(s: &str) -> Result<KinematicState, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match values[..] {
        [position, velocity, acceleration] => Ok(KinematicState::new(position, velocity, acceleration)),
        _ => Err(format!("expected p,v,a but got {} values in '{}'", values.len(), s)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.config {
        Some(ref path) => load_config(&path.to_string_lossy())?,
        None => Config::default(),
    };

    let output = match cli.command {
        Commands::Plan { start, goal } => {
            let planner = DiscretePlanner::from_config(&config)?;
            let trajectory = planner.plan(start, goal, &config.limits)?;
            tracing::info!("planned {} samples ({:.2} s)", trajectory.len(), trajectory.duration());
            serde_json::to_value(&trajectory)?
        }
        Commands::Stop {
            position,
            velocity,
            acceleration,
        } => {
            let planner = DiscretePlanner::from_config(&config)?;
            let start = KinematicState::new(position, velocity, acceleration);
            let trajectory = planner.stopping_planner(&config.limits).plan(start)?;
            serde_json::to_value(&trajectory)?
        }
        Commands::Segments {
            pattern,
            start,
            end,
            closed_form,
        } => {
            let solver = SegmentSolver::from_config(&config)?;
            let boundary = BoundaryConditions::new(start, end);
            let solution = if closed_form {
                if pattern != JerkPattern::accel_limited() {
                    return Err(format!("--closed-form requires pattern +-+, got {}", pattern).into());
                }
                solver.solve_accel_limited(&boundary)?
            } else {
                solver.solve(&pattern, &boundary)?
            };
            let reached = solver
                .equations(&pattern)
                .evaluate(&solution.durations, config.limits.max_jerk, &start);
            json!({
                "pattern": pattern.to_string(),
                "total_duration": solution.total_duration(),
                "solution": solution,
                "end_state": reached,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
