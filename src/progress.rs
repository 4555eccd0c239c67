//! Timestamped text logs.
//!
//! Both `progress_logs/progress.txt` and `conversion_log.txt` are plain
//! newline-delimited files appended to across runs:
//!
//! ```text
//! [07:05:01] Run 20240309_070501 started: 3 files, 8 workers
//! [07:05:04] [1/3] logo.png PNG 500000 -> 312345 bytes (37.53%)
//! ```

use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Format one log line (with trailing newline) for `at`.
pub fn log_line(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {message}\n", at.format("%H:%M:%S"))
}

/// An append-mode log file. Every line goes out in a single write.
pub struct LogFile {
    file: File,
}

impl LogFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn line(&mut self, message: &str) -> io::Result<()> {
        self.file
            .write_all(log_line(Local::now(), message).as_bytes())
    }
}
