//! Input discovery.
//!
//! Finds the PNG files to optimize in the working directory. Only the top
//! level is considered:
//!
//! ```text
//! ./
//! ├── logo.png                       # ✓ candidate
//! ├── Banner.PNG                     # ✓ extension match is case-insensitive
//! ├── .cache.png                     # ✗ hidden
//! ├── notes.png                      # ✗ not actually a PNG (header sniffed)
//! ├── optimized_images_20240101_…/   # ✗ previous run output, never descended
//! └── assets/icon.png                # ✗ nested
//! ```
//!
//! Results are sorted by filename so dispatch order and CSV row order are
//! stable across runs.

use image::{ImageFormat, ImageReader};
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("No PNG files found in {0}")]
    NoInputs(PathBuf),
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// Discover candidate PNG files directly inside `root`.
///
/// Returns [`ScanError::NoInputs`] when nothing qualifies.
pub fn scan(root: &Path) -> Result<Vec<InputImage>, ScanError> {
    let mut inputs = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
            debug!("skipping non UTF-8 filename {}", entry.path().display());
            continue;
        };
        if filename.starts_with('.') || !has_png_extension(entry.path()) {
            continue;
        }
        if !is_png(entry.path()) {
            debug!("skipping {filename}: not a PNG despite its extension");
            continue;
        }
        let size = entry.metadata()?.len();
        inputs.push(InputImage {
            path: entry.path().to_path_buf(),
            filename,
            size,
        });
    }

    if inputs.is_empty() {
        return Err(ScanError::NoInputs(root.to_path_buf()));
    }
    inputs.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(inputs)
}

fn has_png_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Sniff the file header rather than trusting the extension.
fn is_png(path: &Path) -> bool {
    ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map(|r| r.format() == Some(ImageFormat::Png))
        .unwrap_or(false)
}
