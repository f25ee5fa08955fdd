use anyhow::{Context, Result, anyhow};
use crossbeam::channel;
use polars::prelude::*;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use string_intern::Intern;

use query_sweep_collect_results::{FileInfo, SweepCollect};
use query_sweep_config::SweepTasks;
use query_sweep_types::SweepRun;

// Accumulated tables are flushed to disk once they reach this size.
const FLUSH_BYTES: usize = 512 * 1024 * 1024;

struct ToCollectQueue<'a, T>
where
    T: Iterator<Item = (u64, &'a SweepRun, Vec<&'a str>)>,
{
    it: Mutex<T>,
    pb: indicatif::ProgressBar,
}

impl<'a, T> ToCollectQueue<'a, T>
where
    T: Iterator<Item = (u64, &'a SweepRun, Vec<&'a str>)>,
{
    fn new(input: T, progress: indicatif::ProgressBar) -> Self {
        Self {
            it: Mutex::new(input),
            pb: progress,
        }
    }

    fn consume(&self) -> Option<(u64, &'a SweepRun, Vec<&'a str>)> {
        let mut guard = self.it.lock().unwrap();
        let next = guard.next();
        self.pb.tick();
        self.pb.inc(1);
        next
    }
}

type ParquetSubmit = (String, DataFrame);

/// Routes result tables to one accumulator thread per
/// (destination, table) pair, spawning accumulators on first use.
#[derive(Clone)]
struct TableSubmitter<'scope, 'env> {
    source: Arc<Mutex<HashMap<(Intern, Intern), mpsc::SyncSender<DataFrame>>>>,
    local: HashMap<(Intern, Intern), mpsc::SyncSender<DataFrame>>,
    scope: &'scope thread::Scope<'scope, 'env>,
    base_location: &'scope Path,
    submit_queue: channel::Sender<ParquetSubmit>,
}

fn parquet_thread(
    rx: mpsc::Receiver<DataFrame>,
    location: PathBuf,
    write_channel: channel::Sender<ParquetSubmit>,
) {
    if let Some(parent) = location.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }

    let mut index: u64 = 0;
    let mut data: Option<DataFrame> = None;
    while let Ok(msg) = rx.recv() {
        match &mut data {
            Some(acc) => {
                acc.vstack_mut(&msg).unwrap();
            }
            None => {
                data = Some(msg);
            }
        };

        data = if let Some(mut df) = data.take() {
            if df.estimated_size() >= FLUSH_BYTES {
                df.shrink_to_fit();
                write_channel
                    .send((format!("{}_{}.parquet", location.display(), index), df))
                    .unwrap();
                index += 1;
                None
            } else {
                Some(df)
            }
        } else {
            None
        }
    }
    if let Some(mut df) = data {
        df.shrink_to_fit();
        write_channel
            .send((format!("{}_{}.parquet", location.display(), index), df))
            .unwrap();
    }
}

fn parquet_write_thread(inputs: channel::Receiver<ParquetSubmit>) {
    for (path, mut df) in inputs {
        ParquetWriter::new(File::create(path).unwrap())
            .with_compression(ParquetCompression::Zstd(Some(
                ZstdLevel::try_new(9).unwrap(),
            )))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut df)
            .unwrap();
    }
}

impl<'scope, 'env> TableSubmitter<'scope, 'env> {
    pub fn new(
        scope: &'scope thread::Scope<'scope, 'env>,
        base_location: &'scope Path,
        write_channel: channel::Sender<ParquetSubmit>,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(HashMap::new())),
            local: HashMap::new(),
            scope,
            base_location,
            submit_queue: write_channel,
        }
    }

    pub fn submit(
        &mut self,
        key: (Intern, Intern),
        value: DataFrame,
    ) -> std::result::Result<(), mpsc::SendError<DataFrame>> {
        let base_location = self.base_location;
        let scope = self.scope;
        let source = &self.source;
        let chan = self.local.entry(key).or_insert_with(|| {
            let mut locked = source.lock().unwrap();
            locked
                .entry(key)
                .or_insert_with(|| {
                    let (tx, rx) = mpsc::sync_channel(1);
                    let submit = self.submit_queue.clone();
                    thread::Builder::new()
                        .name(format!("acc-{}-{}", key.0, key.1))
                        .spawn_scoped(scope, move || {
                            let path = base_location.join(key.0).join(key.1);
                            parquet_thread(rx, path, submit);
                        })
                        .unwrap();
                    tx
                })
                .clone()
        });
        chan.send(value)
    }
}

fn process_run(run: &SweepRun) -> Result<HashMap<Intern, DataFrame>> {
    let tarfile = BufReader::new(
        File::open(&run.tar_file)
            .with_context(|| format!("Failed to open run archive {}", run.tar_file))?,
    );
    let tarfile = xz2::read::XzDecoder::new(tarfile);
    let mut tarfile = tar::Archive::new(tarfile);

    let entries = tarfile
        .entries()
        .context("Failed to get entries from tar file")?;

    let mut collectors: Vec<Box<dyn SweepCollect>> =
        query_sweep_benchmark_configs::get_collect_config(&run.opt_name)?
            .iter()
            .map(|make| make())
            .collect();

    let mut parsing_issues: Vec<String> = Vec::new();

    for file in entries {
        let file = file.context("Failed to get file from tar")?;
        let path = file
            .path()
            .context("Failed to get the path from tar file")?
            .to_str()
            .context("Failed to turn path to string")?
            .to_string();
        let name = path.trim_start_matches("./");
        let mut file_info = FileInfo::new(name, file);

        for collector in collectors.iter_mut() {
            if let Err(e) = collector.process_file(run, &mut file_info) {
                parsing_issues.push(format!("process_file({}): {}", name, e));
            }
        }
    }

    drop(tarfile);

    let mut return_map: HashMap<Intern, DataFrame> = HashMap::new();
    for collector in collectors {
        match collector.get_result(run) {
            Ok(results) => {
                for (key, val) in results {
                    if return_map.insert(key, val).is_some() {
                        return Err(anyhow!("Collector table name collision: {}", key));
                    }
                }
            }
            Err(e) => {
                parsing_issues.push(format!("get_result: {}", e));
            }
        }
    }

    // Get or create the status DataFrame, then add the parse_status column
    let status_df = return_map
        .entry(Intern::from_static("status"))
        .or_insert_with(|| {
            parsing_issues.push("no status file".to_string());
            df!["status" => &["failed no status"]].unwrap()
        });

    let parse_status: Option<String> = if parsing_issues.is_empty() {
        None
    } else {
        Some(parsing_issues.join("; "))
    };
    status_df.with_column(Column::new("parse_status".into(), &[parse_status]))?;

    Ok(return_map)
}

fn process_thread<'a, T>(queue: &ToCollectQueue<'a, T>, mut submitter: TableSubmitter)
where
    T: Iterator<Item = (u64, &'a SweepRun, Vec<&'a str>)>,
{
    while let Some((id, run, destinations)) = queue.consume() {
        let map = match process_run(run) {
            Ok(v) => v,
            Err(e) => {
                // process_run itself failed - keep a status row so the run
                // stays visible in the output tables
                let status_df = df![
                    "status" => &["failed no status"],
                    "parse_status" => &[Some(e.to_string())],
                ]
                .unwrap();
                HashMap::from([(Intern::from_static("status"), status_df)])
            }
        };

        for (key, mut val) in map.into_iter() {
            val.with_column(Series::new(
                PlSmallStr::from_static("id"),
                vec![id; val.height()],
            ))
            .unwrap();
            if let Some((last, remaining)) = destinations.split_last() {
                for dest in remaining.iter() {
                    submitter
                        .submit((Intern::new(*dest), key), val.clone())
                        .unwrap();
                }
                submitter.submit((Intern::new(*last), key), val).unwrap();
            }
        }
    }
}

fn main() {
    let task_file_path = env::args()
        .nth(1)
        .expect("You need to provide the collection task file path");

    let config = SweepTasks::new(&task_file_path).unwrap();

    let progress = indicatif::MultiProgress::new();
    let main_progress = progress.add(indicatif::ProgressBar::new_spinner());
    main_progress.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{human_pos}] [{elapsed_precise}] {msg}")
            .unwrap()
            .tick_strings(&["▹▹▹▹▹", "▸▹▹▹▹", "▹▸▹▹▹", "▹▹▸▹▹", "▹▹▹▸▹", "▹▹▹▹▸"]),
    );
    main_progress.set_message(format!(
        "Collecting {} from {} runs...",
        config.plan_name(),
        config.run_count()
    ));

    let queue = ToCollectQueue::new(config.to_collect(), main_progress);

    let (write_send, write_receive) = channel::bounded(4);

    let workers = thread::available_parallelism().map_or(4, |n| n.get().min(10));

    thread::scope(|scope| {
        let submitter = TableSubmitter::new(scope, config.location(), write_send);
        for i in 0..4 {
            let rx = write_receive.clone();
            thread::Builder::new()
                .name(format!("writer-{i}"))
                .spawn_scoped(scope, || parquet_write_thread(rx))
                .unwrap();
        }
        for _ in 0..workers {
            let submitter = submitter.clone();
            scope.spawn(|| {
                process_thread(&queue, submitter);
            });
        }
        drop(submitter)
    });
}
