//! Per-file processing and parallel dispatch.
//!
//! ## Flow
//!
//! ```text
//! inputs ──► backup_originals ──► rayon pool (jobs workers)
//!                                   │  process_file: PNG pipeline, then WebP search
//!                                   ▼
//!                              mpsc channel ──► writer thread
//!                                                 ├─ optimization_stats.csv
//!                                                 ├─ progress_logs/progress.txt
//!                                                 ├─ conversion_log.txt
//!                                                 └─ ProcessEvent → caller
//! ```
//!
//! [`process_file`] only touches files owned by its input (working copy,
//! WebP candidates). Everything shared goes through the single writer, so the
//! logs need no locking and rows never interleave.
//!
//! ## Failure policy
//!
//! A PNG stage failure is fatal: no further files are dispatched, files
//! already in flight finish and are recorded, and the first error is
//! returned. A failed WebP grid point is only logged and skipped.

use crate::backup::backup_originals;
use crate::compress::{
    Compressor, PipelineOutcome, PngStage, SearchOutcome, ToolError, WebpSetting, optimize_png,
    search_webp, webp_grid,
};
use crate::config::{Config, effective_threads};
use crate::progress::LogFile;
use crate::run::RunContext;
use crate::scan::InputImage;
use crate::stats::{Format, ImageRecord, StatsWriter};
use chrono::Local;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{filename}: {source}")]
    Tool {
        filename: String,
        #[source]
        source: ToolError,
    },
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Statistics writer stopped")]
    WriterStopped,
}

impl ProcessError {
    /// Process exit code for this error: the failing tool's own code when
    /// it has one, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Tool { source, .. } => source.exit_code().unwrap_or(1),
            _ => 1,
        }
    }
}

/// Immutable settings for a run, shared by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// PNG pipeline stages in execution order.
    pub stages: Vec<PngStage>,
    /// WebP grid; `None` disables the WebP stage.
    pub webp_grid: Option<Vec<WebpSetting>>,
    /// Worker count.
    pub jobs: usize,
}

impl ProcessConfig {
    /// Build from configuration. `webp_available` is false when cwebp is not installed.
    pub fn from_config(config: &Config, webp_available: bool) -> Self {
        let png = &config.png;
        let mut stages = vec![
            PngStage::Quantize {
                min_quality: png.quality[0],
                max_quality: png.quality[1],
                speed: png.speed,
            },
            PngStage::Optipng {
                level: png.optipng_level,
            },
            PngStage::Zopfli {
                iterations: png.zopfli_iterations,
            },
        ];
        if png.second_pass {
            stages.push(PngStage::Oxipng {
                preset: png.oxipng_preset,
            });
        }

        let webp_grid = (config.webp.enabled && webp_available)
            .then(|| webp_grid(&config.webp.quality.levels(), &config.webp.methods));

        Self {
            stages,
            webp_grid,
            jobs: effective_threads(&config.processing),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_config(&Config::default(), true)
    }
}

/// Everything a worker needs to process one input.
#[derive(Debug, Clone, PartialEq)]
pub struct FileJob {
    /// 1-based position in discovery order.
    pub index: usize,
    pub input: InputImage,
    pub backup: PathBuf,
    pub output: PathBuf,
    /// Base name for WebP candidates and the final `<stem>.webp`.
    pub webp_stem: String,
}

/// Pair every input with its backup and output paths.
///
/// WebP names use the file stem, except when two inputs share a stem
/// (`a.png`, `a.PNG`); those keep their full filename as the stem. A name
/// that is still taken gets the input's index appended, so every input owns
/// a distinct set of candidate files.
pub fn plan_jobs(inputs: &[InputImage], backups: &[PathBuf], ctx: &RunContext) -> Vec<FileJob> {
    let stem_of = |input: &InputImage| {
        Path::new(&input.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.filename.clone())
    };
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for input in inputs {
        *stem_counts.entry(stem_of(input)).or_default() += 1;
    }
    let preferred: Vec<String> = inputs
        .iter()
        .map(|input| {
            let stem = stem_of(input);
            if stem_counts[&stem] > 1 {
                input.filename.clone()
            } else {
                stem
            }
        })
        .collect();
    let reserved: HashSet<&str> = preferred.iter().map(String::as_str).collect();
    let mut taken: HashSet<String> = HashSet::new();

    inputs
        .iter()
        .zip(backups)
        .zip(preferred.iter())
        .enumerate()
        .map(|(i, ((input, backup), stem))| {
            let index = i + 1;
            let mut webp_stem = stem.clone();
            let mut suffix = index;
            while taken.contains(&webp_stem)
                || (webp_stem != *stem && reserved.contains(webp_stem.as_str()))
            {
                webp_stem = format!("{stem}-{suffix}");
                suffix += inputs.len();
            }
            taken.insert(webp_stem.clone());
            FileJob {
                index,
                input: input.clone(),
                backup: backup.clone(),
                output: ctx.output_dir.join(&input.filename),
                webp_stem,
            }
        })
        .collect()
}

/// Result of processing one input.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub index: usize,
    pub filename: String,
    pub png: PipelineOutcome,
    pub png_record: ImageRecord,
    /// Present when the WebP stage ran.
    pub webp: Option<(SearchOutcome, ImageRecord)>,
}

impl FileOutcome {
    /// Statistics rows in write order: PNG first, then WebP.
    pub fn records(&self) -> impl Iterator<Item = &ImageRecord> {
        std::iter::once(&self.png_record).chain(self.webp.as_ref().map(|(_, r)| r))
    }
}

fn record_now(
    filename: &str,
    original: u64,
    final_size: u64,
    format: Format,
    took: Duration,
) -> ImageRecord {
    ImageRecord {
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        filename: filename.to_string(),
        original_size: original,
        final_size,
        format,
        duration: took,
    }
}

/// Run the PNG pipeline and, when configured, the WebP search for one input.
pub fn process_file(
    job: &FileJob,
    config: &ProcessConfig,
    webp_dir: &Path,
    backend: &impl Compressor,
) -> Result<FileOutcome, ProcessError> {
    let filename = job.input.filename.clone();
    let tool_error = |source: ToolError| ProcessError::Tool {
        filename: filename.clone(),
        source,
    };

    let started = Instant::now();
    let png = optimize_png(
        backend,
        &job.input.path,
        &job.backup,
        &job.output,
        &config.stages,
    )
    .map_err(tool_error)?;
    let png_record = record_now(
        &filename,
        png.original_size,
        png.final_size,
        Format::Png,
        started.elapsed(),
    );

    let webp = match &config.webp_grid {
        Some(grid) => {
            let started = Instant::now();
            let search = search_webp(backend, &job.output, webp_dir, &job.webp_stem, grid)?;
            let final_size = search
                .kept
                .as_ref()
                .map_or(search.source_size, |kept| kept.size);
            let record = record_now(
                &filename,
                search.source_size,
                final_size,
                Format::Webp,
                started.elapsed(),
            );
            Some((search, record))
        }
        None => None,
    };

    Ok(FileOutcome {
        index: job.index,
        filename,
        png,
        png_record,
        webp,
    })
}

/// Progress events for the CLI.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    RunStarted {
        files: usize,
        jobs: usize,
        grid_points: Option<usize>,
    },
    FileProcessed {
        total: usize,
        outcome: FileOutcome,
    },
}

/// Counts returned by a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub files: usize,
    pub rows: usize,
    pub webp_kept: usize,
}

/// The single owner of every shared output file.
struct Journal {
    stats: StatsWriter,
    progress: LogFile,
    conversion: LogFile,
}

impl Journal {
    fn open(ctx: &RunContext) -> io::Result<Self> {
        Ok(Self {
            stats: StatsWriter::create(&ctx.stats_csv)?,
            progress: LogFile::open(&ctx.progress_log)?,
            conversion: LogFile::open(&ctx.conversion_log)?,
        })
    }

    fn record(&mut self, outcome: &FileOutcome, total: usize) -> io::Result<()> {
        for record in outcome.records() {
            self.stats.append(record)?;
        }

        let png = &outcome.png_record;
        let note = if outcome.png.restored {
            ", no improvement, original kept"
        } else {
            ""
        };
        self.progress.line(&format!(
            "[{}/{}] {} PNG {} -> {} bytes ({:.2}%){note}",
            outcome.index,
            total,
            outcome.filename,
            png.original_size,
            png.final_size,
            png.ratio(),
        ))?;
        self.conversion.line(&format!(
            "{}: PNG pipeline {} -> {} bytes in {:.3}s",
            outcome.filename,
            png.original_size,
            png.final_size,
            png.duration.as_secs_f64(),
        ))?;

        if let Some((search, record)) = &outcome.webp {
            for skipped in &search.skipped {
                self.conversion.line(&format!(
                    "{}: cwebp {} skipped: {}",
                    outcome.filename, skipped.setting, skipped.reason
                ))?;
            }
            let message = match (&search.kept, search.best()) {
                (Some(kept), _) => format!(
                    "WebP {} -> {} bytes ({:.2}%) at {}",
                    record.original_size,
                    kept.size,
                    record.ratio(),
                    kept.setting
                ),
                (None, Some(best)) => format!(
                    "WebP best {} bytes at {} not smaller than {} bytes, discarded",
                    best.size, best.setting, search.source_size
                ),
                (None, None) => "WebP every grid point failed, nothing kept".to_string(),
            };
            self.progress.line(&format!(
                "[{}/{}] {} {message}",
                outcome.index, total, outcome.filename
            ))?;
            self.conversion.line(&format!(
                "{}: {message} ({} of {} grid points encoded, {:.3}s)",
                outcome.filename,
                search.attempts.len(),
                search.attempts.len() + search.skipped.len(),
                record.duration.as_secs_f64(),
            ))?;
        }
        Ok(())
    }
}

/// Drain worker outcomes into the journal until every worker is done.
fn drain(
    rx: Receiver<FileOutcome>,
    journal: &mut Journal,
    total: usize,
    events: Option<&Sender<ProcessEvent>>,
) -> io::Result<RunReport> {
    let mut report = RunReport {
        files: 0,
        rows: 0,
        webp_kept: 0,
    };
    for outcome in rx {
        journal.record(&outcome, total)?;
        report.files += 1;
        if outcome
            .webp
            .as_ref()
            .is_some_and(|(search, _)| search.kept.is_some())
        {
            report.webp_kept += 1;
        }
        if let Some(tx) = events {
            // Display only; a closed receiver must not stop the run.
            let _ = tx.send(ProcessEvent::FileProcessed { total, outcome });
        }
    }
    report.rows = journal.stats.rows_written();
    Ok(report)
}

/// Send a finished file to the writer. Fails once the writer has stopped,
/// which ends dispatch; the writer's own error is reported instead.
fn hand_off(tx: &Sender<FileOutcome>, outcome: FileOutcome) -> Result<(), ProcessError> {
    tx.send(outcome).map_err(|_| ProcessError::WriterStopped)
}

/// Back up, optimize, and convert every input over a bounded worker pool.
///
/// Creates the run directories, truncates the statistics CSV, and appends to
/// both text logs. Returns the first fatal error, after the rows of every
/// file that finished have been written.
pub fn process(
    ctx: &RunContext,
    inputs: &[InputImage],
    config: &ProcessConfig,
    backend: &impl Compressor,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    ctx.create_dirs(config.webp_grid.is_some())?;
    let backups = backup_originals(inputs, &ctx.backup_dir)?;
    let jobs = plan_jobs(inputs, &backups, ctx);
    let total = jobs.len();

    let mut journal = Journal::open(ctx)?;
    let grid_points = config.webp_grid.as_ref().map(Vec::len);
    journal.conversion.line(&format!(
        "Run {} started: {} files, {} workers, WebP {}",
        ctx.timestamp,
        total,
        config.jobs,
        grid_points.map_or("disabled".to_string(), |n| format!("{n} grid points")),
    ))?;
    info!("backed up {total} originals to {}", ctx.backup_dir.display());
    if let Some(tx) = &events {
        let _ = tx.send(ProcessEvent::RunStarted {
            files: total,
            jobs: config.jobs,
            grid_points,
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()?;
    let (tx, rx) = mpsc::channel::<FileOutcome>();

    let (dispatch, drained) = std::thread::scope(|s| {
        let writer = s.spawn(|| drain(rx, &mut journal, total, events.as_ref()));
        let dispatch = pool.install(|| {
            jobs.par_iter().try_for_each_with(tx, |tx, job| {
                debug!("processing {}", job.input.filename);
                let outcome = process_file(job, config, &ctx.webp_dir, backend)?;
                hand_off(tx, outcome)
            })
        });
        let drained = writer
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (dispatch, drained)
    });

    let report = drained?;
    match dispatch {
        Ok(()) => {
            journal.conversion.line(&format!(
                "Run {} finished: {} files, {} rows, {} WebP kept",
                ctx.timestamp, report.files, report.rows, report.webp_kept
            ))?;
            Ok(report)
        }
        Err(err) => {
            journal.conversion.line(&format!(
                "Run {} aborted after {} files: {err}",
                ctx.timestamp, report.files
            ))?;
            Err(err)
        }
    }
}
