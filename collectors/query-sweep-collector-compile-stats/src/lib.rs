use anyhow::Context;
use polars::prelude::*;
use query_sweep_collect_results::SweepCollect;
use query_sweep_types::SweepRun;
use regex::Regex;
use std::sync::LazyLock;
use string_intern::Intern;

static COMPILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"compile\[([a-z0-9_]+)\] (\d+) ms").unwrap());

static CLASSIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"classifier: (\d+) rules").unwrap());

/// Parses the query compiler's stat lines out of the captured benchmark
/// stdout: one `compile[<stage>] <n> ms` line per compilation stage, and
/// a final `classifier: <n> rules` line.
#[derive(Debug, Default)]
pub struct SweepCollectCompileStats {
    seen_stdout: bool,
    compile_df: Option<DataFrame>,
    classifier_df: Option<DataFrame>,
}

impl SweepCollectCompileStats {
    pub fn boxed() -> Box<dyn SweepCollect> {
        Box::new(Self::default())
    }
}

impl SweepCollect for SweepCollectCompileStats {
    fn process_file(
        &mut self,
        _: &SweepRun,
        file: &mut dyn query_sweep_collect_results::FileInfoInterface,
    ) -> anyhow::Result<()> {
        if file.name() != "stdout.txt" {
            return Ok(());
        }

        if self.seen_stdout {
            return Err(anyhow::anyhow!("Duplicate stdout.txt files"));
        }
        self.seen_stdout = true;

        let content = file.content_string()?;

        let mut stages: Vec<String> = Vec::new();
        let mut times: Vec<u64> = Vec::new();
        for cap in COMPILE_REGEX.captures_iter(content) {
            let stage = cap.get(1).context("Missing compile stage")?.as_str();
            let ms: u64 = cap
                .get(2)
                .context("Missing compile time")?
                .as_str()
                .parse()
                .context("Failed to parse compile time")?;
            stages.push(stage.to_string());
            times.push(ms);
        }
        if !stages.is_empty() {
            self.compile_df = Some(
                df![
                    "stage" => stages,
                    "compile_time_ms" => times,
                ]
                .context("Failed to create compile DataFrame")?,
            );
        }

        if let Some(cap) = CLASSIFIER_REGEX.captures(content) {
            let rules: Vec<u64> = vec![
                cap.get(1)
                    .context("Missing rule count")?
                    .as_str()
                    .parse()
                    .context("Failed to parse rule count")?,
            ];
            self.classifier_df = Some(
                df![
                    "classifier_rules" => rules,
                ]
                .context("Failed to create classifier DataFrame")?,
            );
        }

        Ok(())
    }

    fn get_result(
        self: Box<Self>,
        _: &SweepRun,
    ) -> anyhow::Result<Vec<(Intern, DataFrame)>> {
        let mut rv = Vec::new();
        if let Some(df) = self.compile_df {
            rv.push((Intern::from_static("compile_times"), df));
        }
        if let Some(df) = self.classifier_df {
            rv.push((Intern::from_static("classifier"), df));
        }
        Ok(rv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_sweep_collect_results::FileInfo;

    fn sample_run() -> SweepRun {
        SweepRun {
            sweep: Intern::new("waxman_main"),
            query: Intern::new("slice"),
            query_flags: "q1 slice".to_string(),
            topology: Intern::new("waxman_02_04"),
            num_nodes: 20,
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

    const STDOUT: &str = "\
building topology waxman_02_04 n=20
compile[tagging] 412 ms
compile[capture] 96 ms
compile[forwarding] 1033 ms
classifier: 4821 rules
done
";

    #[test]
    fn parses_stages_and_classifier() {
        let mut c = SweepCollectCompileStats::default();
        let mut file = FileInfo::new("stdout.txt", std::io::Cursor::new(STDOUT.as_bytes().to_vec()));
        c.process_file(&sample_run(), &mut file).unwrap();

        let tables = Box::new(c).get_result(&sample_run()).unwrap();
        assert_eq!(tables.len(), 2);

        let compile = &tables[0].1;
        assert_eq!(tables[0].0.as_str(), "compile_times");
        assert_eq!(compile.height(), 3);
        assert_eq!(
            compile.column("compile_time_ms").unwrap().u64().unwrap().get(2),
            Some(1033)
        );

        let classifier = &tables[1].1;
        assert_eq!(tables[1].0.as_str(), "classifier");
        assert_eq!(
            classifier.column("classifier_rules").unwrap().u64().unwrap().get(0),
            Some(4821)
        );
    }

    #[test]
    fn stdout_without_stats_yields_nothing() {
        let mut c = SweepCollectCompileStats::default();
        let mut file = FileInfo::new(
            "stdout.txt",
            std::io::Cursor::new(b"no stats here\n".to_vec()),
        );
        c.process_file(&sample_run(), &mut file).unwrap();
        assert!(Box::new(c).get_result(&sample_run()).unwrap().is_empty());
    }
}
