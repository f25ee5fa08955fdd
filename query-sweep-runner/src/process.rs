use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use query_sweep_types::{RunCase, SweepBlock, SweepPlan, SweepRun, waxman_params};
use string_intern::Intern;

use crate::SweepRunner;
use crate::status::StatusSink;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs every case of a sweep as a child process, strictly one at a
/// time, capturing its output into a per-run tar.xz archive under the
/// plan's output location.
pub struct ProcessRunner {
    progress: Option<ProgressBar>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self { progress: None }
    }

    pub fn with_progress(progress: ProgressBar) -> Self {
        Self {
            progress: Some(progress),
        }
    }

    fn execute_case(
        &self,
        plan: &SweepPlan,
        block: &SweepBlock,
        case: &RunCase<'_>,
        id: u64,
    ) -> Result<SweepRun> {
        if let Some(pb) = &self.progress {
            pb.set_message(format!(
                "{} {} n={} {} #{}",
                block.name, case.query.name, case.num_nodes, case.topology, case.iteration
            ));
        }

        let location = Path::new(&plan.location);
        let scratch = location.join("scratch").join(id.to_string());
        std::fs::create_dir_all(&scratch)
            .with_context(|| format!("Failed to create run directory {}", scratch.display()))?;
        let runs_dir = location.join("runs");
        std::fs::create_dir_all(&runs_dir)
            .with_context(|| format!("Failed to create archive directory {}", runs_dir.display()))?;
        let tar_file = runs_dir.join(format!("{}.tar.xz", id));

        let stdout = File::create(scratch.join("stdout.txt"))
            .context("Failed to create stdout capture file")?;
        let stderr = File::create(scratch.join("stderr.txt"))
            .context("Failed to create stderr capture file")?;

        let (program, base_args) = plan
            .command
            .split_first()
            .context("The benchmark command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(base_args)
            .args(case.query.flags.split_whitespace())
            .args(block.opt.flags.split_whitespace())
            .arg("--topology")
            .arg(case.topology.as_str())
            .arg("--num-nodes")
            .arg(case.num_nodes.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn benchmark command {:?}", plan.command))?;

        let deadline = block.timeout.map(Duration::from_secs);
        let mut timed_out = false;
        let exit_status = loop {
            if let Some(status) = child
                .try_wait()
                .context("Failed to poll the benchmark process")?
            {
                break status;
            }
            if let Some(limit) = deadline
                && started.elapsed() >= limit
            {
                timed_out = true;
                child
                    .kill()
                    .context("Failed to kill the timed out benchmark")?;
                break child
                    .wait()
                    .context("Failed to reap the timed out benchmark")?;
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        let elapsed = started.elapsed().as_secs_f64();
        let exit_code = exit_status.code().map(i64::from);

        let mut time_file =
            File::create(scratch.join("run.time")).context("Failed to create run.time")?;
        writeln!(time_file, "phase,seconds")?;
        writeln!(time_file, "total,{}", elapsed)?;

        std::fs::write(
            scratch.join("bench.exit"),
            format!("{}\n", exit_code.unwrap_or(-1)),
        )
        .context("Failed to write bench.exit")?;

        let status_text = if timed_out {
            "timeout".to_string()
        } else if exit_code == Some(0) {
            "success".to_string()
        } else {
            format!("failed exit {}", exit_code.unwrap_or(-1))
        };
        std::fs::write(scratch.join("status.txt"), format!("{}\n", status_text))
            .context("Failed to write status.txt")?;

        let (waxman_alpha, waxman_beta) = match waxman_params(&case.topology) {
            Some((alpha, beta)) => (Some(alpha), Some(beta)),
            None => (None, None),
        };
        let run = SweepRun {
            sweep: Intern::new(&block.name),
            query: case.query.name,
            query_flags: case.query.flags.clone(),
            topology: case.topology,
            num_nodes: case.num_nodes,
            iteration: case.iteration,
            opt_name: block.opt.name,
            opt_flags: block.opt.flags.clone(),
            tar_file: tar_file.to_string_lossy().into_owned(),
            timeout: block.timeout,
            exit_code,
            waxman_alpha,
            waxman_beta,
        };

        serde_json::to_writer_pretty(
            File::create(scratch.join("config.json")).context("Failed to create config.json")?,
            &run,
        )
        .context("Failed to write config.json")?;

        archive_run_dir(&scratch, &tar_file)?;
        std::fs::remove_dir_all(&scratch)
            .with_context(|| format!("Failed to remove run directory {}", scratch.display()))?;

        Ok(run)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepRunner for ProcessRunner {
    fn run_sweep(
        &mut self,
        plan: &SweepPlan,
        block: &SweepBlock,
        sink: &mut StatusSink,
    ) -> Result<()> {
        for case in block.cases() {
            let id = sink.peek_id();
            let run = self.execute_case(plan, block, &case, id)?;
            sink.record(run)?;
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }
        Ok(())
    }
}

/// Pack a run's scratch directory into a tar.xz with flat member names.
fn archive_run_dir(run_dir: &Path, tar_file: &Path) -> Result<()> {
    let out = File::create(tar_file)
        .with_context(|| format!("Failed to create archive {}", tar_file.display()))?;
    let encoder = xz2::write::XzEncoder::new(out, 6);
    let mut builder = tar::Builder::new(encoder);

    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(run_dir)
        .with_context(|| format!("Failed to list run directory {}", run_dir.display()))?
    {
        entries.push(entry.context("Failed to read run directory entry")?.path());
    }
    entries.sort();

    for path in entries {
        let name = path
            .file_name()
            .context("Run artifact without a file name")?;
        builder
            .append_path_with_name(&path, name)
            .with_context(|| format!("Failed to archive {}", path.display()))?;
    }

    let encoder = builder.into_inner().context("Failed to finish run archive")?;
    encoder.finish().context("Failed to finish xz stream")?;
    Ok(())
}
