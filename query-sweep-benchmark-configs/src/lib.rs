use query_sweep_collect_results::SweepCollect;
use query_sweep_collector_compile_stats::SweepCollectCompileStats;
use query_sweep_collector_config::SweepCollectConfig;
use query_sweep_collector_status::SweepCollectStatus;
use query_sweep_collector_time::SweepCollectTime;

type Result<T> = std::result::Result<T, UnknownProfile>;

#[derive(Debug)]
pub struct UnknownProfile {
    name: String,
}

impl UnknownProfile {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl std::fmt::Display for UnknownProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Optimization profile {} does not have a collection config",
            self.name
        )
    }
}

impl std::error::Error for UnknownProfile {}

const FDD_CONFIG: [fn() -> Box<dyn SweepCollect>; 4] = [
    SweepCollectConfig::boxed,
    SweepCollectStatus::boxed,
    SweepCollectTime::boxed,
    SweepCollectCompileStats::boxed,
];

const BASELINE_CONFIG: [fn() -> Box<dyn SweepCollect>; 3] = [
    SweepCollectConfig::boxed,
    SweepCollectStatus::boxed,
    SweepCollectTime::boxed,
];

/// The collector set for a run's optimization profile. Compile stats
/// only exist for FDD runs, so the baseline set omits that collector.
pub fn get_collect_config(profile: &str) -> Result<&'static [fn() -> Box<dyn SweepCollect>]> {
    Ok(match profile {
        "fdd" => &FDD_CONFIG,
        "baseline" => &BASELINE_CONFIG,
        _ => return Err(UnknownProfile::new(profile.to_string())),
    })
}
