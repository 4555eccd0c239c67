//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Tools
//!     pngquant   /usr/bin/pngquant
//!     optipng    /usr/bin/optipng
//!     zopflipng  /usr/local/bin/zopflipng
//!     cwebp      not found (optional, WebP disabled)
//! ```
//!
//! ## Run
//!
//! ```text
//! Optimizing 3 files with 8 workers (WebP grid: 33 points)
//! [2/3] logo.png
//!     PNG: 500000 → 312345 bytes (37.53%)
//!     WebP: 312345 → 120000 bytes (61.58%) at q25-m6
//! ```
//!
//! Files are printed in completion order; the `[n/total]` index is the
//! discovery position.
//!
//! ## Report
//!
//! ```text
//! Summary
//!     Files processed: 3
//!     PNG: 1.43 MB → 0.89 MB, saved 0.54 MB (37.53%)
//!         Average time: 2.345s
//!     WebP: 0.89 MB → 0.34 MB, saved 0.55 MB (61.58%)
//!         Average time: 40.120s
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::process::{FileOutcome, ProcessEvent};
use crate::run::RunContext;
use crate::stats::Summary;
use crate::tools::ToolStatus;
use std::path::Path;

const MB: f64 = 1024.0 * 1024.0;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB)
}

/// Display a run artifact relative to the working directory.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Check
// ============================================================================

/// Format dependency lookup results, one tool per line.
pub fn format_tool_report(statuses: &[ToolStatus]) -> Vec<String> {
    let mut lines = vec!["Tools".to_string()];
    for status in statuses {
        let name = status.tool.binary();
        let detail = match (&status.path, status.tool.is_required()) {
            (Some(path), _) => path.display().to_string(),
            (None, true) => "not found (required)".to_string(),
            (None, false) => "not found (optional, WebP disabled)".to_string(),
        };
        lines.push(format!("{}{:<10} {}", indent(1), name, detail));
    }
    lines
}

pub fn print_tool_report(statuses: &[ToolStatus]) {
    for line in format_tool_report(statuses) {
        println!("{}", line);
    }
}

// ============================================================================
// Run
// ============================================================================

/// Format a single run progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::RunStarted {
            files,
            jobs,
            grid_points,
        } => {
            let webp = match grid_points {
                Some(n) => format!("WebP grid: {n} points"),
                None => "WebP disabled".to_string(),
            };
            let workers = if *jobs == 1 { "worker" } else { "workers" };
            vec![format!(
                "Optimizing {files} files with {jobs} {workers} ({webp})"
            )]
        }
        ProcessEvent::FileProcessed { total, outcome } => format_outcome(outcome, *total),
    }
}

fn format_outcome(outcome: &FileOutcome, total: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "[{}/{}] {}",
        outcome.index, total, outcome.filename
    )];

    let png = &outcome.png_record;
    if outcome.png.restored {
        lines.push(format!(
            "{}PNG: {} bytes, no improvement (original kept)",
            indent(1),
            png.original_size
        ));
    } else {
        lines.push(format!(
            "{}PNG: {} → {} bytes ({:.2}%)",
            indent(1),
            png.original_size,
            png.final_size,
            png.ratio()
        ));
    }

    if let Some((search, record)) = &outcome.webp {
        let line = match (&search.kept, search.best()) {
            (Some(kept), _) => format!(
                "WebP: {} → {} bytes ({:.2}%) at {}",
                record.original_size,
                kept.size,
                record.ratio(),
                kept.setting
            ),
            (None, Some(best)) => format!(
                "WebP: no smaller encoding (best {} bytes at {})",
                best.size, best.setting
            ),
            (None, None) => format!("WebP: all {} encodes failed", search.skipped.len()),
        };
        lines.push(format!("{}{}", indent(1), line));
        if !search.skipped.is_empty() && !search.attempts.is_empty() {
            lines.push(format!(
                "{}{} grid points failed, see conversion log",
                indent(2),
                search.skipped.len()
            ));
        }
    }
    lines
}

/// Format where a run left its artifacts.
pub fn format_run_artifacts(ctx: &RunContext, with_webp: bool) -> Vec<String> {
    let mut entries = vec![
        ("Backups", &ctx.backup_dir),
        ("Optimized", &ctx.output_dir),
    ];
    if with_webp {
        entries.push(("WebP", &ctx.webp_dir));
    }
    entries.push(("Statistics", &ctx.stats_csv));
    entries.push(("Log", &ctx.conversion_log));

    let mut lines = vec!["Output".to_string()];
    for (label, path) in entries {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            label,
            relative(path, &ctx.root)
        ));
    }
    lines
}

pub fn print_run_artifacts(ctx: &RunContext, with_webp: bool) {
    for line in format_run_artifacts(ctx, with_webp) {
        println!("{}", line);
    }
}

// ============================================================================
// Report
// ============================================================================

/// Format per-format aggregates from the statistics log.
pub fn format_summary(summary: &Summary) -> Vec<String> {
    let mut lines = vec![
        "Summary".to_string(),
        format!("{}Files processed: {}", indent(1), summary.files_processed),
    ];
    for format in &summary.formats {
        lines.push(format!(
            "{}{}: {} → {}, saved {} ({:.2}%)",
            indent(1),
            format.format,
            megabytes(format.original_bytes),
            megabytes(format.final_bytes),
            megabytes(format.saved_bytes),
            format.saved_percent
        ));
        lines.push(format!(
            "{}Average time: {:.3}s",
            indent(2),
            format.average_duration_secs
        ));
    }
    lines
}

pub fn print_summary(summary: &Summary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{Attempt, PipelineOutcome, SearchOutcome, SkippedAttempt, WebpSetting};
    use crate::stats::{Format, ImageRecord};
    use crate::tools::Tool;
    use chrono::{Local, TimeZone};
    use std::path::PathBuf;
    use std::time::Duration;

    fn record(original: u64, final_size: u64, format: Format) -> ImageRecord {
        ImageRecord {
            timestamp: "2024-03-09 07:05:02".into(),
            filename: "logo.png".into(),
            original_size: original,
            final_size,
            format,
            duration: Duration::from_millis(1500),
        }
    }

    fn setting(quality: u8, method: u8) -> WebpSetting {
        WebpSetting { quality, method }
    }

    fn outcome(restored: bool, webp: Option<SearchOutcome>) -> FileOutcome {
        let final_size = if restored { 1000 } else { 600 };
        let webp = webp.map(|search| {
            let final_size = search.kept.as_ref().map_or(600, |k| k.size);
            (search, record(600, final_size, Format::Webp))
        });
        FileOutcome {
            index: 2,
            filename: "logo.png".into(),
            png: PipelineOutcome {
                original_size: 1000,
                final_size,
                restored,
            },
            png_record: record(1000, final_size, Format::Png),
            webp,
        }
    }

    fn attempt(quality: u8, size: u64) -> Attempt {
        Attempt {
            setting: setting(quality, 6),
            size,
            path: PathBuf::from(format!("logo.q{quality}-m6.tmp.webp")),
        }
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn tool_report_marks_missing_tools() {
        let statuses = vec![
            ToolStatus {
                tool: Tool::Pngquant,
                path: Some(PathBuf::from("/usr/bin/pngquant")),
            },
            ToolStatus {
                tool: Tool::Zopflipng,
                path: None,
            },
            ToolStatus {
                tool: Tool::Cwebp,
                path: None,
            },
        ];
        let lines = format_tool_report(&statuses);
        assert_eq!(
            lines,
            vec![
                "Tools",
                "    pngquant   /usr/bin/pngquant",
                "    zopflipng  not found (required)",
                "    cwebp      not found (optional, WebP disabled)",
            ]
        );
    }

    // =========================================================================
    // Run
    // =========================================================================

    #[test]
    fn run_started_line() {
        let event = ProcessEvent::RunStarted {
            files: 3,
            jobs: 8,
            grid_points: Some(33),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["Optimizing 3 files with 8 workers (WebP grid: 33 points)"]
        );

        let event = ProcessEvent::RunStarted {
            files: 1,
            jobs: 1,
            grid_points: None,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["Optimizing 1 files with 1 worker (WebP disabled)"]
        );
    }

    #[test]
    fn processed_file_with_kept_webp() {
        let search = SearchOutcome {
            source_size: 600,
            attempts: vec![attempt(10, 300), attempt(15, 150)],
            skipped: vec![],
            kept: Some(attempt(15, 150)),
        };
        let event = ProcessEvent::FileProcessed {
            total: 3,
            outcome: outcome(false, Some(search)),
        };
        assert_eq!(
            format_process_event(&event),
            vec![
                "[2/3] logo.png",
                "    PNG: 1000 → 600 bytes (40.00%)",
                "    WebP: 600 → 150 bytes (75.00%) at q15-m6",
            ]
        );
    }

    #[test]
    fn processed_file_without_improvement() {
        let search = SearchOutcome {
            source_size: 1000,
            attempts: vec![attempt(10, 1200)],
            skipped: vec![SkippedAttempt {
                setting: setting(15, 6),
                reason: "cwebp exited with status 255".into(),
            }],
            kept: None,
        };
        let lines = format_process_event(&ProcessEvent::FileProcessed {
            total: 2,
            outcome: outcome(true, Some(search)),
        });
        assert_eq!(lines[1], "    PNG: 1000 bytes, no improvement (original kept)");
        assert_eq!(
            lines[2],
            "    WebP: no smaller encoding (best 1200 bytes at q10-m6)"
        );
        assert_eq!(lines[3], "        1 grid points failed, see conversion log");
    }

    #[test]
    fn processed_file_with_every_encode_failing() {
        let search = SearchOutcome {
            source_size: 600,
            attempts: vec![],
            skipped: vec![
                SkippedAttempt {
                    setting: setting(10, 4),
                    reason: "boom".into(),
                },
                SkippedAttempt {
                    setting: setting(10, 5),
                    reason: "boom".into(),
                },
            ],
            kept: None,
        };
        let lines = format_process_event(&ProcessEvent::FileProcessed {
            total: 1,
            outcome: outcome(false, Some(search)),
        });
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "    WebP: all 2 encodes failed");
    }

    #[test]
    fn run_artifacts_are_relative_to_root() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let ctx = RunContext::new(Path::new("/work"), started);

        let lines = format_run_artifacts(&ctx, false);
        assert_eq!(
            lines,
            vec![
                "Output",
                "    Backups: backup_original_images_20240309_070501",
                "    Optimized: optimized_images_20240309_070501",
                "    Statistics: optimization_stats.csv",
                "    Log: conversion_log.txt",
            ]
        );
        assert!(
            format_run_artifacts(&ctx, true)
                .contains(&"    WebP: webp_images_20240309_070501".to_string())
        );
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn summary_lists_each_format() {
        let records = vec![
            record(2 * 1024 * 1024, 1024 * 1024, Format::Png),
            record(1024 * 1024, 256 * 1024, Format::Webp),
        ];
        let lines = format_summary(&Summary::from_records(&records));
        assert_eq!(
            lines,
            vec![
                "Summary",
                "    Files processed: 1",
                "    PNG: 2.00 MB → 1.00 MB, saved 1.00 MB (50.00%)",
                "        Average time: 1.500s",
                "    WebP: 1.00 MB → 0.25 MB, saved 0.75 MB (75.00%)",
                "        Average time: 1.500s",
            ]
        );
    }

    #[test]
    fn empty_summary_has_only_file_count() {
        let lines = format_summary(&Summary::from_records(&[]));
        assert_eq!(lines, vec!["Summary", "    Files processed: 0"]);
    }
}
