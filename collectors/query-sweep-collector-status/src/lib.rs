use anyhow::Context;
use polars::prelude::*;
use query_sweep_collect_results::SweepCollect;
use query_sweep_types::SweepRun;
use string_intern::Intern;

/// Reads the runner's `status.txt` and `bench.exit`. A `success` status
/// is downgraded when the recorded exit code disagrees with it.
#[derive(Debug, Default)]
pub struct SweepCollectStatus {
    status: Option<String>,
    exit_code: Option<i64>,
}

impl SweepCollectStatus {
    pub fn boxed() -> Box<dyn SweepCollect> {
        Box::new(Self::default())
    }
}

impl SweepCollect for SweepCollectStatus {
    fn process_file(
        &mut self,
        _: &SweepRun,
        file: &mut dyn query_sweep_collect_results::FileInfoInterface,
    ) -> anyhow::Result<()> {
        match file.name() {
            "status.txt" => {
                if self.status.is_some() {
                    return Err(anyhow::anyhow!("Duplicate status.txt files"));
                }
                self.status = Some(file.content_string()?.trim().to_string());
            }
            "bench.exit" => {
                if self.exit_code.is_some() {
                    return Err(anyhow::anyhow!("Duplicate bench.exit files"));
                }
                self.exit_code = Some(
                    file.content_string()?
                        .trim()
                        .parse()
                        .context("Failed to parse benchmark exit code")?,
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn get_result(
        self: Box<Self>,
        _: &SweepRun,
    ) -> anyhow::Result<Vec<(Intern, DataFrame)>> {
        let mut status = self.status.unwrap_or_else(|| "unknown".to_string());

        if status == "success"
            && let Some(code) = self.exit_code
            && code != 0
        {
            status = format!("benchmark exited with code {}", code);
        }

        let df = df![
            "status" => &[status],
        ]
        .context("Failed to create status DataFrame")?;

        Ok(vec![(Intern::from_static("status"), df)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_sweep_collect_results::FileInfo;

    fn sample_run() -> SweepRun {
        SweepRun {
            sweep: Intern::new("waxman_main"),
            query: Intern::new("tm"),
            query_flags: "q1 tm".to_string(),
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

    fn offer(collector: &mut SweepCollectStatus, name: &str, content: &str) {
        let mut file = FileInfo::new(name, std::io::Cursor::new(content.as_bytes().to_vec()));
        collector.process_file(&sample_run(), &mut file).unwrap();
    }

    fn status_of(collector: Box<SweepCollectStatus>) -> String {
        let tables = collector.get_result(&sample_run()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0.as_str(), "status");
        let col = tables[0].1.column("status").unwrap().str().unwrap().clone();
        col.get(0).unwrap().to_string()
    }

    #[test]
    fn clean_run_reports_success() {
        let mut c = SweepCollectStatus::default();
        offer(&mut c, "status.txt", "success\n");
        offer(&mut c, "bench.exit", "0\n");
        offer(&mut c, "stdout.txt", "ignored");
        assert_eq!(status_of(Box::new(c)), "success");
    }

    #[test]
    fn exit_code_overrides_optimistic_status() {
        let mut c = SweepCollectStatus::default();
        offer(&mut c, "status.txt", "success\n");
        offer(&mut c, "bench.exit", "9\n");
        assert_eq!(status_of(Box::new(c)), "benchmark exited with code 9");
    }

    #[test]
    fn missing_files_report_unknown() {
        let c = SweepCollectStatus::default();
        assert_eq!(status_of(Box::new(c)), "unknown");
    }

    #[test]
    fn duplicate_status_file_is_an_error() {
        let mut c = SweepCollectStatus::default();
        offer(&mut c, "status.txt", "success\n");
        let mut dup = FileInfo::new(
            "status.txt",
            std::io::Cursor::new(b"timeout\n".to_vec()),
        );
        assert!(c.process_file(&sample_run(), &mut dup).is_err());
    }
}
