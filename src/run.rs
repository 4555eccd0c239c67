//! Per-run directory layout.
//!
//! Every run gets timestamp-namespaced directories next to the input files so
//! concurrent or repeated runs never collide:
//!
//! ```text
//! ./
//! ├── image.png                          # original, never modified
//! ├── backup_original_images_<ts>/       # pristine copies
//! ├── optimized_images_<ts>/             # pipeline output
//! ├── webp_images_<ts>/                  # search winners (WebP stage only)
//! ├── progress_logs/progress.txt
//! ├── conversion_log.txt
//! └── optimization_stats.csv
//! ```

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

pub const BACKUP_PREFIX: &str = "backup_original_images_";
pub const OUTPUT_PREFIX: &str = "optimized_images_";
pub const WEBP_PREFIX: &str = "webp_images_";
pub const PROGRESS_DIR: &str = "progress_logs";
pub const PROGRESS_FILENAME: &str = "progress.txt";
pub const CONVERSION_LOG_FILENAME: &str = "conversion_log.txt";
pub const STATS_FILENAME: &str = "optimization_stats.csv";

/// Paths for a single run. Constructed once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub root: PathBuf,
    pub timestamp: String,
    pub backup_dir: PathBuf,
    pub output_dir: PathBuf,
    pub webp_dir: PathBuf,
    pub progress_log: PathBuf,
    pub conversion_log: PathBuf,
    pub stats_csv: PathBuf,
}

impl RunContext {
    /// Lay out the run directories for `root`, namespaced by `started`.
    ///
    /// Pure: nothing is created on disk until [`RunContext::create_dirs`].
    pub fn new(root: &Path, started: DateTime<Local>) -> Self {
        let timestamp = started.format("%Y%m%d_%H%M%S").to_string();
        Self {
            root: root.to_path_buf(),
            backup_dir: root.join(format!("{BACKUP_PREFIX}{timestamp}")),
            output_dir: root.join(format!("{OUTPUT_PREFIX}{timestamp}")),
            webp_dir: root.join(format!("{WEBP_PREFIX}{timestamp}")),
            progress_log: root.join(PROGRESS_DIR).join(PROGRESS_FILENAME),
            conversion_log: root.join(CONVERSION_LOG_FILENAME),
            stats_csv: root.join(STATS_FILENAME),
            timestamp,
        }
    }

    /// Create the run directories. The WebP directory only when that stage runs.
    pub fn create_dirs(&self, with_webp: bool) -> io::Result<()> {
        std::fs::create_dir_all(&self.backup_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        if with_webp {
            std::fs::create_dir_all(&self.webp_dir)?;
        }
        if let Some(parent) = self.progress_log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn directories_are_timestamp_namespaced() {
        let ctx = RunContext::new(Path::new("/work"), fixed_time());
        assert_eq!(ctx.timestamp, "20240309_070501");
        assert_eq!(
            ctx.backup_dir,
            Path::new("/work/backup_original_images_20240309_070501")
        );
        assert_eq!(
            ctx.output_dir,
            Path::new("/work/optimized_images_20240309_070501")
        );
        assert_eq!(ctx.webp_dir, Path::new("/work/webp_images_20240309_070501"));
        assert_eq!(ctx.progress_log, Path::new("/work/progress_logs/progress.txt"));
        assert_eq!(ctx.stats_csv, Path::new("/work/optimization_stats.csv"));
        assert_eq!(ctx.conversion_log, Path::new("/work/conversion_log.txt"));
    }

    #[test]
    fn new_touches_nothing_on_disk() {
        let tmp = TempDir::new().unwrap();
        let _ctx = RunContext::new(tmp.path(), fixed_time());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn create_dirs_skips_webp_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let ctx = RunContext::new(tmp.path(), fixed_time());
        ctx.create_dirs(false).unwrap();

        assert!(ctx.backup_dir.is_dir());
        assert!(ctx.output_dir.is_dir());
        assert!(!ctx.webp_dir.exists());
        assert!(tmp.path().join(PROGRESS_DIR).is_dir());
    }
}
