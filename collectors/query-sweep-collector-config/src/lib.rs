use anyhow::Result;
use polars::prelude::DataFrame;
use query_sweep_collect_results::{FileInfoInterface, SweepCollect};
use query_sweep_types::SweepRun;
use string_intern::Intern;

/// Emits the run's own configuration record as the `config` table.
#[derive(Default)]
pub struct SweepCollectConfig {}

impl SweepCollectConfig {
    pub fn boxed() -> Box<dyn SweepCollect> {
        Box::new(Self::default())
    }
}

impl SweepCollect for SweepCollectConfig {
    fn process_file(&mut self, _: &SweepRun, _: &mut dyn FileInfoInterface) -> Result<()> {
        Ok(())
    }

    fn get_result(self: Box<Self>, run: &SweepRun) -> Result<Vec<(Intern, DataFrame)>> {
        Ok(vec![(Intern::from_static("config"), run.to_df()?)])
    }
}
