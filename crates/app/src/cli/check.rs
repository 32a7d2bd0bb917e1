use std::path::PathBuf;

use clap::Args;
use lading::fixtures::load_plan;

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    /// Plan file (YAML)
    #[arg(long)]
    plan: PathBuf,
}

pub(crate) fn run(args: &CheckArgs) -> Result<(), String> {
    let plan = load_plan(&args.plan)
        .map_err(|error| format!("failed to load {}: {error}", args.plan.display()))?;

    plan.validate()
        .map_err(|error| format!("plan is not packable: {error}"))?;

    println!(
        "{}: {} rows, {} steps, ok",
        args.plan.display(),
        plan.rows.len(),
        plan.steps.len()
    );

    Ok(())
}
