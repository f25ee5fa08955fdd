use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use query_sweep_types::SweepRun;

#[derive(Debug, Serialize, Deserialize)]
struct StatusFile {
    plan: String,
    runs: HashMap<String, SweepRun>,
}

/// Appends run records to `<location>/status.json`, assigning sequential
/// run identifiers. The file is rewritten after every recorded run, so a
/// crashed invocation keeps everything finished so far. Reopening an
/// existing status file resumes: new runs continue after the highest
/// recorded id.
pub struct StatusSink {
    path: PathBuf,
    status: StatusFile,
    next_id: u64,
}

impl StatusSink {
    pub fn open(location: &Path, plan_name: &str) -> Result<Self> {
        std::fs::create_dir_all(location).with_context(|| {
            format!("Failed to create output location {}", location.display())
        })?;
        let path = location.join("status.json");

        if !path.exists() {
            return Ok(Self {
                path,
                status: StatusFile {
                    plan: plan_name.to_string(),
                    runs: HashMap::new(),
                },
                next_id: 0,
            });
        }

        let reader = BufReader::new(
            File::open(&path)
                .with_context(|| format!("Failed to open status file {}", path.display()))?,
        );
        let status: StatusFile = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse status file {}", path.display()))?;
        if status.plan != plan_name {
            bail!(
                "status file {} belongs to plan {:?}, not {:?}",
                path.display(),
                status.plan,
                plan_name
            );
        }

        let ids: Result<Vec<u64>, std::num::ParseIntError> =
            status.runs.keys().map(|key| key.parse::<u64>()).collect();
        let next_id = ids
            .with_context(|| format!("The run ids in {}", path.display()))?
            .into_iter()
            .max()
            .map_or(0, |max| max + 1);

        Ok(Self {
            path,
            status,
            next_id,
        })
    }

    /// The id the next recorded run will receive.
    pub fn peek_id(&self) -> u64 {
        self.next_id
    }

    pub fn record(&mut self, run: SweepRun) -> Result<u64> {
        let id = self.next_id;
        self.status.runs.insert(id.to_string(), run);
        self.next_id += 1;
        self.persist()?;
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.status.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.runs.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let writer = BufWriter::new(File::create(&self.path).with_context(|| {
            format!("Failed to rewrite status file {}", self.path.display())
        })?);
        serde_json::to_writer_pretty(writer, &self.status)
            .with_context(|| format!("Failed to serialize status file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use string_intern::Intern;
    use tempfile::TempDir;

    fn run_for(query: &str) -> SweepRun {
        SweepRun {
            sweep: Intern::new("waxman_main"),
            query: Intern::new(query),
            query_flags: format!("q1 {}", query),
            topology: Intern::new("waxman_03_03"),
            num_nodes: 40,
            iteration: 0,
            opt_name: Intern::new("fdd"),
            opt_flags: "--use_fdd".to_string(),
            tar_file: "runs/0.tar.xz".to_string(),
            timeout: None,
            exit_code: Some(0),
            waxman_alpha: None,
            waxman_beta: None,
        }
    }

    #[test]
    fn ids_are_sequential_and_resume() {
        let dir = TempDir::new().unwrap();

        let mut sink = StatusSink::open(dir.path(), "waxman_fdd").unwrap();
        assert_eq!(sink.peek_id(), 0);
        assert_eq!(sink.record(run_for("tm")).unwrap(), 0);
        assert_eq!(sink.record(run_for("slice")).unwrap(), 1);
        drop(sink);

        let mut sink = StatusSink::open(dir.path(), "waxman_fdd").unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.record(run_for("ddos")).unwrap(), 2);
    }

    #[test]
    fn rejects_status_from_another_plan() {
        let dir = TempDir::new().unwrap();
        let mut sink = StatusSink::open(dir.path(), "waxman_fdd").unwrap();
        sink.record(run_for("tm")).unwrap();
        drop(sink);

        assert!(StatusSink::open(dir.path(), "fattree_fdd").is_err());
    }
}
