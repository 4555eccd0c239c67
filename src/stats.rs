//! Per-file statistics: the CSV log and its summary.
//!
//! ## File format
//!
//! ```text
//! timestamp,filename,original_size,final_size,compression_ratio,format,duration,memory_usage
//! 2024-03-09 07:05:02,logo.png,500000,312345,37.53,PNG,4.210,0
//! 2024-03-09 07:05:09,logo.png,312345,312345,0,WebP,6.874,0
//! ```
//!
//! One header, then one row per (file, format). `compression_ratio` is `0`
//! for zero savings, otherwise a two-decimal percentage. `memory_usage` is
//! reserved and always `0`. Filenames with commas or quotes are quoted.
//!
//! The file is only ever written by one thread (see
//! [`process`](crate::process)), so rows never interleave.

use crate::compress::savings_ratio;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CSV_HEADER: &str =
    "timestamp,filename,original_size,final_size,compression_ratio,format,duration,memory_usage";

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Statistics file is empty or missing its header")]
    MissingHeader,
    #[error("Malformed row {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Output format of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Format {
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "WebP")]
    Webp,
}

impl Format {
    pub fn tag(self) -> &'static str {
        match self {
            Format::Png => "PNG",
            Format::Webp => "WebP",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PNG" => Some(Format::Png),
            "WebP" => Some(Format::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One processed (file, format) pair. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Local wall-clock time the record was produced, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub filename: String,
    pub original_size: u64,
    pub final_size: u64,
    pub format: Format,
    pub duration: Duration,
}

impl ImageRecord {
    /// Savings percentage; zero when the file did not get smaller.
    pub fn ratio(&self) -> f64 {
        savings_ratio(self.original_size, self.final_size)
    }

    /// Render as a CSV row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        let ratio = self.ratio();
        let ratio = if ratio == 0.0 {
            "0".to_string()
        } else {
            format!("{ratio:.2}")
        };
        format!(
            "{},{},{},{},{},{},{:.3},0",
            self.timestamp,
            quote_field(&self.filename),
            self.original_size,
            self.final_size,
            ratio,
            self.format,
            self.duration.as_secs_f64(),
        )
    }

    /// Parse a CSV row. `line` is the 1-based line number for error messages.
    pub fn from_csv_row(row: &str, line: usize) -> Result<Self, StatsError> {
        let malformed = |reason: String| StatsError::Malformed { line, reason };
        let fields = split_fields(row).map_err(malformed)?;
        if fields.len() != 8 {
            return Err(malformed(format!("expected 8 fields, got {}", fields.len())));
        }
        let size = |i: usize, name: &str| {
            fields[i]
                .parse::<u64>()
                .map_err(|e| malformed(format!("{name} {:?}: {e}", fields[i])))
        };
        let original_size = size(2, "original_size")?;
        let final_size = size(3, "final_size")?;
        let format = Format::from_tag(&fields[5])
            .ok_or_else(|| malformed(format!("unknown format {:?}", fields[5])))?;
        let duration = fields[6]
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| malformed(format!("invalid duration {:?}", fields[6])))?;

        Ok(Self {
            timestamp: fields[0].clone(),
            filename: fields[1].clone(),
            original_size,
            final_size,
            format,
            duration,
        })
    }
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV line, honoring double-quoted fields with `""` escapes.
fn split_fields(row: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = row.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            (c, _) => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(current);
    Ok(fields)
}

/// Append-only CSV writer. Owned by a single thread for the whole run.
pub struct StatsWriter {
    file: File,
    rows: usize,
}

impl StatsWriter {
    /// Create (or truncate) the CSV and write the header.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(file, "{CSV_HEADER}")?;
        Ok(Self { file, rows: 0 })
    }

    /// Append one row; each row is a single `write` of a complete line.
    pub fn append(&mut self, record: &ImageRecord) -> io::Result<()> {
        let line = format!("{}\n", record.to_csv_row());
        self.file.write_all(line.as_bytes())?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

/// Read every record back from a CSV written by [`StatsWriter`].
pub fn read_records(path: &Path) -> Result<Vec<ImageRecord>, StatsError> {
    let content = std::fs::read_to_string(path)?;
    let mut rows = split_records(&content).into_iter();

    let header = rows.next().map(|(_, row)| row.trim_end());
    if header != Some(CSV_HEADER) {
        return Err(StatsError::MissingHeader);
    }

    let mut records = Vec::new();
    for (line, row) in rows {
        if row.trim().is_empty() {
            continue;
        }
        records.push(ImageRecord::from_csv_row(row.trim_end(), line)?);
    }
    Ok(records)
}

/// Split CSV text into records with their 1-based starting line.
///
/// Newlines inside quoted fields belong to the record, so a filename
/// containing `\n` stays in one row.
fn split_records(text: &str) -> Vec<(usize, &str)> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let mut line = 1;
    let mut start_line = 1;

    for (i, c) in text.char_indices() {
        match c {
            // `""` escapes toggle twice, leaving the state unchanged.
            '"' => in_quotes = !in_quotes,
            '\n' => {
                line += 1;
                if !in_quotes {
                    records.push((start_line, &text[start..i]));
                    start = i + 1;
                    start_line = line;
                }
            }
            _ => {}
        }
    }
    if start < text.len() {
        records.push((start_line, &text[start..]));
    }
    records
}

// ============================================================================
// Summary
// ============================================================================

/// Aggregates for one format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatSummary {
    pub format: Format,
    pub count: usize,
    pub original_bytes: u64,
    pub final_bytes: u64,
    pub saved_bytes: u64,
    pub saved_percent: f64,
    pub total_duration_secs: f64,
    pub average_duration_secs: f64,
}

/// Aggregates over a whole statistics log, partitioned by format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Number of PNG rows: every processed input yields exactly one.
    pub files_processed: usize,
    /// One entry per format present, PNG first.
    pub formats: Vec<FormatSummary>,
}

impl Summary {
    pub fn from_records(records: &[ImageRecord]) -> Self {
        let formats: Vec<FormatSummary> = [Format::Png, Format::Webp]
            .into_iter()
            .filter_map(|format| summarize(format, records))
            .collect();
        let files_processed = formats
            .iter()
            .find(|f| f.format == Format::Png)
            .map_or(0, |f| f.count);
        Self {
            files_processed,
            formats,
        }
    }

    pub fn for_format(&self, format: Format) -> Option<&FormatSummary> {
        self.formats.iter().find(|f| f.format == format)
    }
}

fn summarize(format: Format, records: &[ImageRecord]) -> Option<FormatSummary> {
    let rows: Vec<&ImageRecord> = records.iter().filter(|r| r.format == format).collect();
    if rows.is_empty() {
        return None;
    }
    let count = rows.len();
    let original_bytes: u64 = rows.iter().map(|r| r.original_size).sum();
    let final_bytes: u64 = rows.iter().map(|r| r.final_size).sum();
    let total_duration_secs: f64 = rows.iter().map(|r| r.duration.as_secs_f64()).sum();
    Some(FormatSummary {
        format,
        count,
        original_bytes,
        final_bytes,
        saved_bytes: original_bytes.saturating_sub(final_bytes),
        saved_percent: savings_ratio(original_bytes, final_bytes),
        total_duration_secs,
        average_duration_secs: total_duration_secs / count as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(filename: &str, original: u64, final_size: u64, format: Format) -> ImageRecord {
        ImageRecord {
            timestamp: "2024-03-09 07:05:02".into(),
            filename: filename.into(),
            original_size: original,
            final_size,
            format,
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn row_format_matches_header_columns() {
        let row = record("logo.png", 500_000, 312_345, Format::Png).to_csv_row();
        assert_eq!(row, "2024-03-09 07:05:02,logo.png,500000,312345,37.53,PNG,1.500,0");
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count());
    }

    #[test]
    fn zero_savings_ratio_is_written_as_plain_zero() {
        let row = record("logo.png", 500_000, 500_000, Format::Webp).to_csv_row();
        assert_eq!(row, "2024-03-09 07:05:02,logo.png,500000,500000,0,WebP,1.500,0");
    }

    #[test]
    fn filenames_with_commas_and_quotes_survive() {
        let original = record("a, \"b\".png", 10, 5, Format::Png);
        let row = original.to_csv_row();
        assert!(row.contains("\"a, \"\"b\"\".png\""));

        let parsed = ImageRecord::from_csv_row(&row, 2).unwrap();
        assert_eq!(parsed.filename, "a, \"b\".png");
        assert_eq!(parsed.final_size, 5);
    }

    #[test]
    fn filenames_with_newlines_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        let mut writer = StatsWriter::create(&path).unwrap();
        writer.append(&record("a\nb.png", 100, 80, Format::Png)).unwrap();
        writer.append(&record("c\r\nd.png", 100, 90, Format::Png)).unwrap();
        writer.append(&record("plain.png", 100, 70, Format::Png)).unwrap();
        drop(writer);

        let records = read_records(&path).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a\nb.png", "c\r\nd.png", "plain.png"]);
        assert_eq!(records[2].final_size, 70);
    }

    #[test]
    fn malformed_row_reports_its_starting_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        std::fs::write(
            &path,
            format!("{CSV_HEADER}\nt,\"x\ny.png\",10,5,50.00,PNG,1.000,0\nt,bad\n"),
        )
        .unwrap();
        assert!(matches!(
            read_records(&path),
            Err(StatsError::Malformed { line: 4, .. })
        ));
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        std::fs::write(&path, format!("{CSV_HEADER}\nt,\"open.png,10,5,50.00,PNG,1.000,0\n")).unwrap();
        assert!(matches!(
            read_records(&path),
            Err(StatsError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        let err = ImageRecord::from_csv_row("a,b,c", 7).unwrap_err();
        assert!(matches!(err, StatsError::Malformed { line: 7, .. }));
    }

    #[test]
    fn parse_rejects_unknown_format() {
        let err =
            ImageRecord::from_csv_row("t,a.png,10,5,50.00,AVIF,1.000,0", 2).unwrap_err();
        assert!(err.to_string().contains("AVIF"));
    }

    #[test]
    fn writer_emits_one_header_and_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        let mut writer = StatsWriter::create(&path).unwrap();
        writer.append(&record("a.png", 100, 80, Format::Png)).unwrap();
        writer.append(&record("a.png", 80, 60, Format::Webp)).unwrap();
        assert_eq!(writer.rows_written(), 2);
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].format, Format::Webp);
    }

    #[test]
    fn create_truncates_previous_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        std::fs::write(&path, "stale\nrows\n").unwrap();

        StatsWriter::create(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn read_requires_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stats.csv");
        std::fs::write(&path, "t,a.png,10,5,50.00,PNG,1.000,0\n").unwrap();
        assert!(matches!(read_records(&path), Err(StatsError::MissingHeader)));
    }

    #[test]
    fn summary_partitions_by_format() {
        let records = vec![
            record("a.png", 1_000_000, 600_000, Format::Png),
            record("b.png", 1_000_000, 1_000_000, Format::Png),
            record("a.png", 600_000, 300_000, Format::Webp),
        ];
        let summary = Summary::from_records(&records);

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.formats.len(), 2);

        let png = summary.for_format(Format::Png).unwrap();
        assert_eq!(png.count, 2);
        assert_eq!(png.saved_bytes, 400_000);
        assert_eq!(png.saved_percent, 20.0);
        assert_eq!(png.average_duration_secs, 1.5);

        let webp = summary.for_format(Format::Webp).unwrap();
        assert_eq!(webp.count, 1);
        assert_eq!(webp.saved_percent, 50.0);
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = Summary::from_records(&[]);
        assert_eq!(summary.files_processed, 0);
        assert!(summary.formats.is_empty());
    }
}
