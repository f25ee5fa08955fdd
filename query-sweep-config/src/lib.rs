use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use query_sweep_types::{SweepRun, SweepRunFilter};

/// The collection workload: every run recorded in a sweep output
/// directory's status file, joined against the task file's destination
/// filters.
pub struct SweepTasks {
    plan: String,
    location: PathBuf,
    runs: HashMap<u64, SweepRun>,
    collections: HashMap<String, SweepRunFilter>,
}

#[derive(Debug, Deserialize)]
struct SweepTaskConfig {
    location: String,
    collect: HashMap<String, SweepRunFilter>,
}

#[derive(Debug, Deserialize)]
struct SweepStatus {
    plan: String,
    runs: HashMap<String, SweepRun>,
}

impl SweepTasks {
    pub fn new(task_file_path: &str) -> Result<Self> {
        let task_file = BufReader::new(
            File::open(task_file_path)
                .with_context(|| format!("Failed to open task file {}", task_file_path))?,
        );
        let task_config: SweepTaskConfig =
            serde_json::from_reader(task_file).context("Failed to parse task file")?;

        let location = PathBuf::from(&task_config.location);
        let status_path = location.join("status.json");
        let status_reader = BufReader::new(File::open(&status_path).with_context(|| {
            format!("Failed to open status file {}", status_path.display())
        })?);
        let status: SweepStatus = serde_json::from_reader(status_reader)
            .with_context(|| format!("Failed to parse status file {}", status_path.display()))?;

        let runs: std::result::Result<HashMap<u64, SweepRun>, std::num::ParseIntError> = status
            .runs
            .into_iter()
            .map(|(key, val)| key.parse::<u64>().map(|parsed| (parsed, val)))
            .collect();
        let runs = runs.with_context(|| format!("The run ids in {}", status_path.display()))?;

        Ok(Self {
            plan: status.plan,
            location,
            runs,
            collections: task_config.collect,
        })
    }

    pub fn plan_name(&self) -> &str {
        &self.plan
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Runs matched by at least one destination filter, with every
    /// destination that wants them.
    pub fn to_collect(&self) -> impl Iterator<Item = (u64, &SweepRun, Vec<&str>)> {
        self.runs.iter().filter_map(|(&id, run)| {
            let destinations: Vec<&str> = self
                .collections
                .iter()
                .filter_map(|(dest, filter)| filter.contains(run).then_some(dest.as_str()))
                .collect();
            (!destinations.is_empty()).then_some((id, run, destinations))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use string_intern::Intern;
    use tempfile::TempDir;

    fn run_json(query: &str, num_nodes: u64) -> String {
        format!(
            r#"{{
                "sweep": "waxman_main",
                "query": "{query}",
                "query_flags": "q1 {query}",
                "topology": "waxman_02_04",
                "num_nodes": {num_nodes},
                "iteration": 0,
                "opt_name": "fdd",
                "opt_flags": "--use_fdd",
                "tar_file": "runs/x.tar.xz",
                "timeout": null,
                "exit_code": 0,
                "waxman_alpha": null,
                "waxman_beta": null
            }}"#
        )
    }

    fn write_fixture(dir: &TempDir, collect: &str) -> String {
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(
            out.join("status.json"),
            format!(
                r#"{{"plan": "waxman_fdd", "runs": {{"0": {}, "1": {}, "2": {}}}}}"#,
                run_json("tm", 20),
                run_json("slice", 20),
                run_json("slice", 160),
            ),
        )
        .unwrap();

        let task_path = dir.path().join("tasks.json");
        std::fs::write(
            &task_path,
            format!(
                r#"{{"location": {:?}, "collect": {}}}"#,
                out.to_string_lossy(),
                collect
            ),
        )
        .unwrap();
        task_path.to_string_lossy().into_owned()
    }

    #[test]
    fn joins_runs_against_destination_filters() {
        let dir = TempDir::new().unwrap();
        let task_path = write_fixture(
            &dir,
            r#"{
                "all": {},
                "slice_only": {"query": ["slice"]},
                "big": {"num_nodes": [160, 250]}
            }"#,
        );

        let tasks = SweepTasks::new(&task_path).unwrap();
        assert_eq!(tasks.plan_name(), "waxman_fdd");
        assert_eq!(tasks.run_count(), 3);

        let mut by_id: Vec<(u64, Vec<&str>)> = tasks
            .to_collect()
            .map(|(id, _, mut dests)| {
                dests.sort();
                (id, dests)
            })
            .collect();
        by_id.sort();

        assert_eq!(by_id.len(), 3);
        assert_eq!(by_id[0], (0, vec!["all"]));
        assert_eq!(by_id[1], (1, vec!["all", "slice_only"]));
        assert_eq!(by_id[2], (2, vec!["all", "big", "slice_only"]));
    }

    #[test]
    fn unmatched_runs_are_dropped() {
        let dir = TempDir::new().unwrap();
        let task_path = write_fixture(&dir, r#"{"none": {"query": ["firewall"]}}"#);

        let tasks = SweepTasks::new(&task_path).unwrap();
        assert_eq!(tasks.to_collect().count(), 0);
        // The runs are still known, they just have nowhere to go.
        assert_eq!(tasks.run_count(), 3);
        assert_eq!(tasks.runs[&0].query, Intern::new("tm"));
    }
}
