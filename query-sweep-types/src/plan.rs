use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use string_intern::Intern;

/// One query variant: a short identifier and the argument string passed
/// to the benchmark binary (whitespace-separated, e.g. "q1 tm").
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuerySpec {
    pub name: Intern,
    pub flags: String,
}

/// The optimization configuration applied uniformly to every run of a
/// sweep: a label (used in artifact naming and collection) and extra
/// benchmark flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptSpec {
    pub name: Intern,
    pub flags: String,
}

/// One sweep: the query records, the node-count axis, the topology
/// instance axis, and the per-combination repetition count.
///
/// A sweep marked `skip` is reported but not executed unless it is
/// selected explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepBlock {
    pub name: String,
    #[serde(default)]
    pub skip: bool,
    pub cnt: u64,
    pub opt: OptSpec,
    pub queries: Vec<QuerySpec>,
    pub num_nodes: Vec<u64>,
    pub tests: Vec<Intern>,
    /// Per-run timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepPlan {
    pub name: String,
    /// Output root for run archives and the status file.
    pub location: String,
    /// Benchmark invocation prefix: program plus base arguments.
    pub command: Vec<String>,
    pub sweeps: Vec<SweepBlock>,
}

/// One point of a sweep's query x node-count x topology product.
#[derive(Debug, Clone, Copy)]
pub struct RunCase<'a> {
    pub query: &'a QuerySpec,
    pub num_nodes: u64,
    pub topology: Intern,
    pub iteration: u64,
}

impl SweepBlock {
    /// Enumerates the sweep's runs: queries outermost, then node counts,
    /// then topology instances, `cnt` iterations each.
    pub fn cases(&self) -> impl Iterator<Item = RunCase<'_>> {
        self.queries.iter().flat_map(move |query| {
            self.num_nodes.iter().flat_map(move |&num_nodes| {
                self.tests.iter().flat_map(move |&topology| {
                    (0..self.cnt).map(move |iteration| RunCase {
                        query,
                        num_nodes,
                        topology,
                        iteration,
                    })
                })
            })
        })
    }

    pub fn case_count(&self) -> u64 {
        self.queries.len() as u64
            * self.num_nodes.len() as u64
            * self.tests.len() as u64
            * self.cnt
    }
}

impl SweepPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(
            File::open(path)
                .with_context(|| format!("Failed to open plan file {}", path.display()))?,
        );
        let plan: SweepPlan = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse plan file {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            bail!("plan {:?} has an empty benchmark command", self.name);
        }
        if self.sweeps.is_empty() {
            bail!("plan {:?} has no sweeps", self.name);
        }
        let mut names: HashSet<&str> = HashSet::new();
        for sweep in &self.sweeps {
            if !names.insert(&sweep.name) {
                bail!("duplicate sweep name {:?}", sweep.name);
            }
            if sweep.cnt == 0 {
                bail!("sweep {:?} has cnt = 0", sweep.name);
            }
            if sweep.queries.is_empty() {
                bail!("sweep {:?} has no queries", sweep.name);
            }
            if sweep.num_nodes.is_empty() {
                bail!("sweep {:?} has no node counts", sweep.name);
            }
            if sweep.tests.is_empty() {
                bail!("sweep {:?} has no topology instances", sweep.name);
            }
            let mut queries: HashSet<Intern> = HashSet::new();
            for q in &sweep.queries {
                if !queries.insert(q.name) {
                    bail!("sweep {:?} has duplicate query {:?}", sweep.name, q.name);
                }
            }
        }
        Ok(())
    }
}
