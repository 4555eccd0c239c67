//! # pngpress
//!
//! Batch PNG optimizer. Every PNG in a working directory is pushed through a
//! chain of external compressors, with a WebP rendition found by exhaustive
//! parameter search. Originals are never modified.
//!
//! # Architecture: Per-File Pipeline
//!
//! ```text
//! 1. Check     PATH          →  Toolchain         (pngquant, optipng, zopflipng, cwebp?)
//! 2. Scan      ./*.png       →  Vec<InputImage>   (depth 1, header-sniffed, sorted)
//! 3. Backup    inputs        →  backup_original_images_<ts>/
//! 4. Process   each input    →  optimized_images_<ts>/, webp_images_<ts>/
//! 5. Report    stats CSV     →  per-format summary
//! ```
//!
//! Steps 1 and 2 run before anything is written, so a missing tool or an
//! empty directory leaves no trace. Step 4 runs in parallel, one file per
//! worker; everything shared (CSV, logs) is written by a single thread.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tools`] | Resolves the external compressors on `PATH` |
//! | [`scan`] | Discovers input PNGs in the working directory |
//! | [`run`] | Timestamped per-run directory layout |
//! | [`backup`] | Pristine copies of every input |
//! | [`compress`] | PNG stages, WebP grid search, the `Compressor` backend trait |
//! | [`process`] | Per-file processing and the bounded parallel dispatcher |
//! | [`stats`] | Statistics CSV writer, reader, and per-format summary |
//! | [`progress`] | Timestamped append-only text logs |
//! | [`config`] | `pngpress.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fallback to the Backup
//!
//! Lossy quantization can make an already-tight PNG larger. After all stages
//! the working copy must be strictly smaller than the original; otherwise it
//! is replaced by the pristine backup. The optimized directory therefore
//! never holds a file larger than its source.
//!
//! ## Exhaustive WebP Search
//!
//! WebP output size is not monotonic in quality or method, so every grid
//! point is encoded and only the smallest result survives. Ties go to the
//! earliest grid point so identical encoder output always picks the same
//! winner.
//!
//! ## External Tools Behind a Trait
//!
//! The compressors are invoked through [`compress::Compressor`]. Production
//! uses [`compress::ExternalTools`]; tests use a recording mock that fakes
//! size changes, so pipeline and search logic are covered without any
//! binaries installed.

pub mod backup;
pub mod compress;
pub mod config;
pub mod output;
pub mod process;
pub mod progress;
pub mod run;
pub mod scan;
pub mod stats;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;
