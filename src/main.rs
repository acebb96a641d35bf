use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;

use vmplan::solver::{ReconfigurationAlgorithm, Termination};
use vmplan::{logger, solve_instance};

/// Compute a reconfiguration plan for a datacenter instance file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the instance JSON (model + constraints)
    instance: String,

    /// Wall-clock budget for the search, in seconds
    #[arg(long)]
    time_limit: Option<u64>,
}

fn main() -> ExitCode {
    logger::init();
    let args = Args::parse();

    let mut algorithm = ReconfigurationAlgorithm::new();
    algorithm.set_time_limit(args.time_limit.map(Duration::from_secs));

    match solve_instance(&args.instance, &algorithm) {
        Ok(outcome) => match outcome.plan {
            Some(plan) => {
                log::info!(
                    "Plan found: {} actions, duration {}, {:?} ({} nodes explored).",
                    plan.size(),
                    plan.duration(),
                    outcome.termination,
                    outcome.statistics.nodes
                );
                for action in plan.actions() {
                    println!("{}", action);
                }
                ExitCode::SUCCESS
            }
            None => {
                match outcome.termination {
                    Termination::Infeasible => log::error!("No plan exists for this constraint set."),
                    _ => log::error!("No plan found within the budget."),
                }
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            log::error!("Solving failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
