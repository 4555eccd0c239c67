//! Pristine copies of the inputs.
//!
//! Runs once, before any worker starts. The pipeline's no-improvement
//! fallback restores from these copies, never from the working directory.

use crate::scan::InputImage;
use std::io;
use std::path::{Path, PathBuf};

/// Copy every input into `backup_dir`, returning the backup paths in input order.
pub fn backup_originals(inputs: &[InputImage], backup_dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(backup_dir)?;
    inputs
        .iter()
        .map(|input| {
            let dest = backup_dir.join(&input.filename);
            std::fs::copy(&input.path, &dest)?;
            Ok(dest)
        })
        .collect()
}
