//! High-level compression operations.
//!
//! These combine the pure grid calculations with backend execution:
//! [`optimize_png`] runs the staged pipeline with its no-improvement
//! fallback, [`search_webp`] runs the exhaustive WebP grid.

use super::backend::{Compressor, ToolError};
use super::grid::pick_smallest;
use super::params::{PngStage, WebpParams, WebpSetting};
use std::io;
use std::path::{Path, PathBuf};

/// Result of the PNG pipeline for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub original_size: u64,
    pub final_size: u64,
    /// True when the pipeline result was discarded and the backup copied back.
    pub restored: bool,
}

/// Optimize `source` into `output` through `stages`.
///
/// The working copy at `output` is rewritten in place by each stage. If the
/// result is not strictly smaller than the original, it is replaced by the
/// pristine `backup`, so `output` is never larger than `source`. Any stage
/// failure aborts immediately.
pub fn optimize_png(
    backend: &impl Compressor,
    source: &Path,
    backup: &Path,
    output: &Path,
    stages: &[PngStage],
) -> Result<PipelineOutcome, ToolError> {
    let original_size = std::fs::metadata(source)?.len();
    std::fs::copy(source, output)?;

    for stage in stages {
        backend.apply(stage, output)?;
    }

    let optimized_size = std::fs::metadata(output)?.len();
    if optimized_size < original_size {
        return Ok(PipelineOutcome {
            original_size,
            final_size: optimized_size,
            restored: false,
        });
    }

    std::fs::copy(backup, output)?;
    Ok(PipelineOutcome {
        original_size,
        final_size: std::fs::metadata(output)?.len(),
        restored: true,
    })
}

/// One successful grid encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub setting: WebpSetting,
    pub size: u64,
    pub path: PathBuf,
}

/// One grid encode that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAttempt {
    pub setting: WebpSetting,
    pub reason: String,
}

/// Result of the WebP search for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub source_size: u64,
    /// Successful encodes in grid order. Their temporary files are gone.
    pub attempts: Vec<Attempt>,
    pub skipped: Vec<SkippedAttempt>,
    /// The installed winner, at its final path. `None` when no encode
    /// succeeded or none beat the source.
    pub kept: Option<Attempt>,
}

impl SearchOutcome {
    /// Smallest encode, whether or not it was kept.
    pub fn best(&self) -> Option<&Attempt> {
        let sizes: Vec<u64> = self.attempts.iter().map(|a| a.size).collect();
        pick_smallest(&sizes).map(|i| &self.attempts[i])
    }
}

/// Encode `source` at every grid point and keep only the smallest result.
///
/// Candidates are written to `work_dir` as `<stem>.<setting>.tmp.webp`. An
/// encode failure skips that grid point. Afterwards every candidate except
/// the winner is deleted; the winner is renamed to `<stem>.webp` if it is
/// strictly smaller than the source, and deleted otherwise.
pub fn search_webp(
    backend: &impl Compressor,
    source: &Path,
    work_dir: &Path,
    stem: &str,
    grid: &[WebpSetting],
) -> io::Result<SearchOutcome> {
    let source_size = std::fs::metadata(source)?.len();
    let mut attempts = Vec::new();
    let mut skipped = Vec::new();

    for &setting in grid {
        let params = WebpParams {
            source: source.to_path_buf(),
            output: work_dir.join(format!("{stem}.{setting}.tmp.webp")),
            setting,
        };
        let result = backend
            .encode_webp(&params)
            .and_then(|()| Ok(std::fs::metadata(&params.output)?.len()));
        match result {
            Ok(size) => attempts.push(Attempt {
                setting,
                size,
                path: params.output,
            }),
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&params.output) {
                    discard(&attempts);
                    return Err(cleanup);
                }
                skipped.push(SkippedAttempt {
                    setting,
                    reason: e.to_string(),
                });
            }
        }
    }

    let sizes: Vec<u64> = attempts.iter().map(|a| a.size).collect();
    let winner = pick_smallest(&sizes);

    let losers: Vec<&Attempt> = attempts
        .iter()
        .enumerate()
        .filter(|&(i, _)| Some(i) != winner)
        .map(|(_, attempt)| attempt)
        .collect();
    if let Some(err) = losers
        .iter()
        .map(|attempt| remove_if_exists(&attempt.path))
        .find_map(Result::err)
    {
        discard(&attempts);
        return Err(err);
    }

    let kept = match winner.map(|i| attempts[i].clone()) {
        Some(best) if best.size < source_size => {
            let final_path = work_dir.join(format!("{stem}.webp"));
            if let Err(err) = std::fs::rename(&best.path, &final_path) {
                discard(&attempts);
                return Err(err);
            }
            Some(Attempt {
                path: final_path,
                ..best
            })
        }
        Some(best) => {
            remove_if_exists(&best.path)?;
            None
        }
        None => None,
    };

    Ok(SearchOutcome {
        source_size,
        attempts,
        skipped,
        kept,
    })
}

/// Best-effort removal of every candidate, used when the search aborts.
fn discard(attempts: &[Attempt]) {
    for attempt in attempts {
        let _ = remove_if_exists(&attempt.path);
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
