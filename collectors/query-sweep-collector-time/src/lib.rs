use anyhow::Context;
use polars::prelude::*;
use query_sweep_collect_results::SweepCollect;
use query_sweep_types::SweepRun;
use std::sync::LazyLock;
use string_intern::Intern;

static TIME_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::from_iter(vec![
        Field::new("phase".into(), DataType::String),
        Field::new("seconds".into(), DataType::Float64),
    ]))
});

/// Reads the runner's `run.time` CSV into the `time` table.
#[derive(Debug, Default)]
pub struct SweepCollectTime {
    time_df: Option<DataFrame>,
}

impl SweepCollectTime {
    pub fn boxed() -> Box<dyn SweepCollect> {
        Box::new(Self::default())
    }
}

impl SweepCollect for SweepCollectTime {
    fn process_file(
        &mut self,
        _: &SweepRun,
        file: &mut dyn query_sweep_collect_results::FileInfoInterface,
    ) -> anyhow::Result<()> {
        if file.name() != "run.time" {
            return Ok(());
        }

        if self.time_df.is_some() {
            return Err(anyhow::anyhow!("Duplicate run.time files"));
        }

        let cursor = std::io::Cursor::new(file.content_bytes()?);

        self.time_df = Some(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_schema(Some(TIME_SCHEMA.clone()))
                .into_reader_with_file_handle(cursor)
                .finish()
                .context("Failed to parse run.time")?,
        );

        Ok(())
    }

    fn get_result(
        self: Box<Self>,
        _: &SweepRun,
    ) -> anyhow::Result<Vec<(Intern, DataFrame)>> {
        let mut rv = Vec::new();
        if let Some(df) = self.time_df {
            rv.push((Intern::from_static("time"), df));
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

    #[test]
    fn parses_the_time_csv() {
        let mut c = SweepCollectTime::default();
        let mut file = FileInfo::new(
            "run.time",
            std::io::Cursor::new(b"phase,seconds\ntotal,12.5\n".to_vec()),
        );
        c.process_file(&sample_run(), &mut file).unwrap();

        let tables = Box::new(c).get_result(&sample_run()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0.as_str(), "time");
        let df = &tables[0].1;
        assert_eq!(df.height(), 1);
        assert_eq!(
            df.column("seconds").unwrap().f64().unwrap().get(0),
            Some(12.5)
        );
    }

    #[test]
    fn other_files_produce_no_table() {
        let mut c = SweepCollectTime::default();
        let mut file = FileInfo::new("stdout.txt", std::io::Cursor::new(b"x".to_vec()));
        c.process_file(&sample_run(), &mut file).unwrap();
        assert!(Box::new(c).get_result(&sample_run()).unwrap().is_empty());
    }
}
