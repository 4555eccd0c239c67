//! Parameter types for compressor invocations.
//!
//! These describe *what* to run, not *how*. [`operations`](super::operations)
//! decides which stages and grid points to run; the
//! [`backend`](super::backend) turns them into tool invocations.

use std::fmt;
use std::path::PathBuf;

/// One in-place stage of the PNG pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngStage {
    /// Lossy palette reduction (pngquant).
    Quantize { min_quality: u8, max_quality: u8, speed: u8 },
    /// Lossless recompression (optipng).
    Optipng { level: u8 },
    /// Slow brute-force deflate (zopflipng).
    Zopfli { iterations: u32 },
    /// Second lossless pass (oxipng, in-process).
    Oxipng { preset: u8 },
}

impl PngStage {
    /// Short name used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            PngStage::Quantize { .. } => "pngquant",
            PngStage::Optipng { .. } => "optipng",
            PngStage::Zopfli { .. } => "zopflipng",
            PngStage::Oxipng { .. } => "oxipng",
        }
    }
}

/// A single point of the WebP search grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WebpSetting {
    /// cwebp `-q`, 0-100.
    pub quality: u8,
    /// cwebp `-m`, 0-6.
    pub method: u8,
}

impl fmt::Display for WebpSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}-m{}", self.quality, self.method)
    }
}

/// Full specification of one WebP encode.
#[derive(Debug, Clone, PartialEq)]
pub struct WebpParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub setting: WebpSetting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_display_is_filename_safe() {
        let s = WebpSetting {
            quality: 35,
            method: 6,
        };
        assert_eq!(s.to_string(), "q35-m6");
    }

    #[test]
    fn stage_labels_name_the_tool() {
        assert_eq!(
            PngStage::Quantize {
                min_quality: 65,
                max_quality: 80,
                speed: 1
            }
            .label(),
            "pngquant"
        );
        assert_eq!(PngStage::Zopfli { iterations: 15 }.label(), "zopflipng");
        assert_eq!(PngStage::Oxipng { preset: 4 }.label(), "oxipng");
    }
}
