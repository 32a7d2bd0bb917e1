use std::{io, path::PathBuf, time::Instant};

use clap::Args;
use humanize_duration::{Truncate, prelude::DurationExt};
use lading::{
    fixtures::{FixtureError, PlanFixture, load_plan},
    session::Redirect,
    solver::{PackingSolver, grid::GridSolver},
};
use lading_app::{client::HttpSolver, config::SolverConfig};
use tracing::{info, warn};

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// Plan file (YAML)
    #[arg(long)]
    plan: PathBuf,

    /// Pack with the built-in grid solver instead of the remote service
    #[arg(long)]
    offline: bool,

    #[command(flatten)]
    solver: SolverConfig,
}

pub(crate) async fn run(args: RunArgs) -> Result<(), String> {
    let plan = load_plan(&args.plan)
        .map_err(|error| format!("failed to load {}: {error}", args.plan.display()))?;

    if args.offline {
        drive(&plan, GridSolver::new()).await
    } else {
        let solver = HttpSolver::from_config(&args.solver)
            .map_err(|error| format!("failed to build solver client: {error}"))?;

        info!(url = solver.url(), "using remote solver");

        drive(&plan, solver).await
    }
}

async fn drive<S: PackingSolver>(plan: &PlanFixture, solver: S) -> Result<(), String> {
    let mut runner = plan.session(solver);
    let started = Instant::now();
    let mut failed = 0_usize;

    for step in &plan.steps {
        match runner.apply(step).await {
            Ok(()) => println!("{step}: ok"),
            Err(error) => {
                failed += 1;
                warn!(%step, %error, "step failed");
                println!("{step}: {error}");

                if let Some(hint) = redirect_hint(&error) {
                    println!("  {hint}");
                }
            }
        }
    }

    let elapsed = started.elapsed();

    println!();

    runner
        .session()
        .write_report(io::stdout().lock())
        .map_err(|error| format!("failed to write report: {error}"))?;

    println!();
    println!(
        "{} steps, {failed} failed, in {}",
        plan.steps.len(),
        elapsed.human(Truncate::Nano)
    );

    Ok(())
}

fn redirect_hint(error: &FixtureError) -> Option<&'static str> {
    let FixtureError::Session(error) = error else {
        return None;
    };

    error.redirect().map(|redirect| match redirect {
        Redirect::Login => "sign in again and set LADING_SESSION_TOKEN",
        Redirect::Upgrade => "the solver quota is used up; upgrade the plan to continue",
    })
}
