use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use query_sweep_runner::{DriveOptions, ProcessRunner, drive, is_selected};
use query_sweep_types::SweepPlan;

#[derive(Debug, Parser)]
#[command(
    name = "query-sweep-run",
    version,
    about = "Execute the benchmark query sweeps of a plan file."
)]
struct Args {
    /// Path to the sweep plan JSON file.
    plan: PathBuf,

    /// Also execute sweeps marked "skip" in the plan.
    #[arg(long)]
    include_skipped: bool,

    /// Run only the named sweep (repeatable). Naming a skipped sweep
    /// selects it.
    #[arg(long = "sweep")]
    sweeps: Vec<String>,

    /// List the runs that would execute, without executing anything.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let plan = SweepPlan::load(&args.plan)?;
    let options = DriveOptions {
        include_skipped: args.include_skipped,
        only: args.sweeps,
    };

    if args.dry_run {
        return dry_run(&plan, &options);
    }

    let total: u64 = plan
        .sweeps
        .iter()
        .filter(|sweep| is_selected(sweep, &options))
        .map(|sweep| sweep.case_count())
        .sum();
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} [{pos}/{len}] [{elapsed_precise}] {msg}")
            .unwrap(),
    );

    let mut runner = ProcessRunner::with_progress(progress.clone());
    let summary = drive(&plan, &options, &mut runner)?;
    progress.finish_and_clear();

    for name in &summary.executed {
        println!("executed {}", name);
    }
    for name in &summary.skipped {
        println!(
            "skipped {} (select it with --sweep {} or --include-skipped)",
            name, name
        );
    }
    Ok(())
}

fn dry_run(plan: &SweepPlan, options: &DriveOptions) -> Result<()> {
    for sweep in &plan.sweeps {
        if !is_selected(sweep, options) {
            println!("# skipping sweep {}", sweep.name);
            continue;
        }
        for case in sweep.cases() {
            println!(
                "{} {} n={} {} #{}",
                sweep.name, case.query.name, case.num_nodes, case.topology, case.iteration
            );
        }
    }
    Ok(())
}
