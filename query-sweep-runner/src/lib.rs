use anyhow::{Result, bail};
use std::path::Path;

use query_sweep_types::{SweepBlock, SweepPlan};

mod process;
mod status;

pub use process::ProcessRunner;
pub use status::StatusSink;

/// The seam between sweep configuration and sweep execution: the driver
/// makes one call per executed sweep block, passing the plan context and
/// the block by reference.
pub trait SweepRunner {
    fn run_sweep(
        &mut self,
        plan: &SweepPlan,
        block: &SweepBlock,
        sink: &mut StatusSink,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct DriveOptions {
    /// Execute sweeps marked `skip` as well.
    pub include_skipped: bool,
    /// Restrict execution to the named sweeps. Naming a skipped sweep
    /// selects it for execution.
    pub only: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DriveSummary {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Whether the options select this sweep for execution. A sweep named in
/// the selection list always runs, `skip` flag or not.
pub fn is_selected(sweep: &SweepBlock, options: &DriveOptions) -> bool {
    let named = options.only.contains(&sweep.name);
    if !options.only.is_empty() && !named {
        return false;
    }
    !(sweep.skip && !options.include_skipped && !named)
}

/// Walk the plan's sweeps in order and hand each one that is selected
/// for execution to the runner. Skipped sweeps are reported, never
/// silently dropped.
pub fn drive(
    plan: &SweepPlan,
    options: &DriveOptions,
    runner: &mut dyn SweepRunner,
) -> Result<DriveSummary> {
    plan.validate()?;
    for name in &options.only {
        if !plan.sweeps.iter().any(|sweep| &sweep.name == name) {
            bail!("plan {:?} has no sweep named {:?}", plan.name, name);
        }
    }

    let mut sink = StatusSink::open(Path::new(&plan.location), &plan.name)?;
    let mut summary = DriveSummary::default();
    for sweep in &plan.sweeps {
        if is_selected(sweep, options) {
            runner.run_sweep(plan, sweep, &mut sink)?;
            summary.executed.push(sweep.name.clone());
        } else if options.only.is_empty() {
            summary.skipped.push(sweep.name.clone());
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    static REFERENCE_PLAN: &str = include_str!("../../plans/waxman_fdd.json");

    struct RecordingRunner {
        invocations: Vec<SweepBlock>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                invocations: Vec::new(),
            }
        }
    }

    impl SweepRunner for RecordingRunner {
        fn run_sweep(
            &mut self,
            _plan: &SweepPlan,
            block: &SweepBlock,
            _sink: &mut StatusSink,
        ) -> Result<()> {
            self.invocations.push(block.clone());
            Ok(())
        }
    }

    fn reference_plan_in(dir: &TempDir) -> SweepPlan {
        let mut plan: SweepPlan = serde_json::from_str(REFERENCE_PLAN).unwrap();
        plan.location = dir.path().join("out").to_string_lossy().into_owned();
        plan
    }

    #[test]
    fn skipped_sweep_is_reported_not_executed() {
        let dir = TempDir::new().unwrap();
        let plan = reference_plan_in(&dir);
        let mut runner = RecordingRunner::new();

        let summary = drive(&plan, &DriveOptions::default(), &mut runner).unwrap();

        // The reference plan's second block is the literal script's
        // unreachable sweep: exactly one runner invocation happens, and
        // it carries the first block's configuration.
        assert_eq!(runner.invocations.len(), 1);
        assert_eq!(summary.executed, ["waxman_main"]);
        assert_eq!(summary.skipped, ["waxman_large"]);

        let block = &runner.invocations[0];
        assert_eq!(block.name, "waxman_main");
        assert_eq!(block.queries.len(), 6);
        assert_eq!(block.queries[3].name.as_str(), "slice");
        assert_eq!(block.queries[3].flags, "q1 slice");
        assert_eq!(block.num_nodes, [20, 40, 60, 80, 100, 120, 140, 160]);
        assert_eq!(block.opt.name.as_str(), "fdd");
        assert_eq!(block.opt.flags, "-d -l -i -a -c -b --use_fdd");
        let tests: Vec<&str> = block.tests.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            tests,
            ["waxman_02_04", "waxman_03_03", "waxman_04_02", "waxman_05_015"]
        );
    }

    #[test]
    fn include_skipped_executes_every_sweep() {
        let dir = TempDir::new().unwrap();
        let plan = reference_plan_in(&dir);
        let mut runner = RecordingRunner::new();

        let options = DriveOptions {
            include_skipped: true,
            only: Vec::new(),
        };
        let summary = drive(&plan, &options, &mut runner).unwrap();

        assert_eq!(summary.executed, ["waxman_main", "waxman_large"]);
        assert!(summary.skipped.is_empty());
        assert_eq!(runner.invocations[1].num_nodes, [180, 200, 250]);
    }

    #[test]
    fn naming_a_skipped_sweep_selects_it() {
        let dir = TempDir::new().unwrap();
        let plan = reference_plan_in(&dir);
        let mut runner = RecordingRunner::new();

        let options = DriveOptions {
            include_skipped: false,
            only: vec!["waxman_large".to_string()],
        };
        let summary = drive(&plan, &options, &mut runner).unwrap();

        assert_eq!(runner.invocations.len(), 1);
        assert_eq!(runner.invocations[0].name, "waxman_large");
        assert_eq!(summary.executed, ["waxman_large"]);
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn unknown_sweep_selection_is_an_error() {
        let dir = TempDir::new().unwrap();
        let plan = reference_plan_in(&dir);
        let mut runner = RecordingRunner::new();

        let options = DriveOptions {
            include_skipped: false,
            only: vec!["fattree_main".to_string()],
        };
        assert!(drive(&plan, &options, &mut runner).is_err());
    }
}
