//! Compressor backend trait and shared error type.
//!
//! The [`Compressor`] trait covers the two things the pipeline asks of the
//! outside world: apply a PNG stage to a file in place, and encode a WebP.
//!
//! The production implementation is
//! [`ExternalTools`](super::external::ExternalTools), which shells out to the
//! binaries resolved by [`Toolchain`](crate::tools::Toolchain).

use super::params::{PngStage, WebpParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{tool} exited with {}: {stderr}", describe_code(.code))]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("oxipng failed: {0}")]
    Oxipng(String),
    #[error("{0} is not installed")]
    Unavailable(&'static str),
}

impl ToolError {
    /// Exit code of the failed tool, when it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ToolError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

/// Trait for compressor backends.
///
/// `Sync` so a single backend can be shared by every rayon worker.
pub trait Compressor: Sync {
    /// Apply one PNG stage to `file`, rewriting it in place.
    fn apply(&self, stage: &PngStage, file: &Path) -> Result<(), ToolError>;

    /// Encode `params.source` as WebP into `params.output`.
    fn encode_webp(&self, params: &WebpParams) -> Result<(), ToolError>;
}
