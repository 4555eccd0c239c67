//! Production backend: shells out to the installed compressors.
//!
//! ## Invocations
//!
//! | Stage | Command |
//! |---|---|
//! | Quantize | `pngquant --quality=MIN-MAX --speed S --force --output F -- F` |
//! | Optipng | `optipng -oL -quiet -- F` |
//! | Zopfli | `zopflipng -y --iterations=N --filters=01234mepb F F` |
//! | Oxipng | `oxipng` crate, `Options::from_preset(P)`, in-process |
//! | WebP | `cwebp -quiet -q Q -m M SRC -o OUT` |
//!
//! Every tool runs exactly once per call; there are no retries. stdout is
//! discarded and stderr is captured into [`ToolError::Failed`].

use super::backend::{Compressor, ToolError};
use super::params::{PngStage, WebpParams};
use crate::tools::Toolchain;
use log::debug;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

/// pngquant: conversion result would be larger than the input.
const PNGQUANT_SKIPPED_LARGER: i32 = 98;
/// pngquant: quality floor could not be reached.
const PNGQUANT_QUALITY_TOO_LOW: i32 = 99;

/// Backend invoking the binaries of a resolved [`Toolchain`].
pub struct ExternalTools {
    toolchain: Toolchain,
}

impl ExternalTools {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl Compressor for ExternalTools {
    fn apply(&self, stage: &PngStage, file: &Path) -> Result<(), ToolError> {
        let tool = stage.label();
        match *stage {
            PngStage::Quantize {
                min_quality,
                max_quality,
                speed,
            } => {
                let args = quantize_args(min_quality, max_quality, speed, file);
                match run(tool, &self.toolchain.pngquant, &args) {
                    Err(ToolError::Failed {
                        code: Some(code @ (PNGQUANT_SKIPPED_LARGER | PNGQUANT_QUALITY_TOO_LOW)),
                        ..
                    }) => {
                        debug!(
                            "pngquant left {} unchanged (exit {code})",
                            file.display()
                        );
                        Ok(())
                    }
                    other => other,
                }
            }
            PngStage::Optipng { level } => {
                run(tool, &self.toolchain.optipng, &optipng_args(level, file))
            }
            PngStage::Zopfli { iterations } => {
                run(tool, &self.toolchain.zopflipng, &zopfli_args(iterations, file))
            }
            PngStage::Oxipng { preset } => oxipng_in_place(file, preset),
        }
    }

    fn encode_webp(&self, params: &WebpParams) -> Result<(), ToolError> {
        let cwebp = self
            .toolchain
            .cwebp
            .as_deref()
            .ok_or(ToolError::Unavailable("cwebp"))?;
        run("cwebp", cwebp, &cwebp_args(params))
    }
}

fn quantize_args(min: u8, max: u8, speed: u8, file: &Path) -> Vec<OsString> {
    vec![
        format!("--quality={min}-{max}").into(),
        "--speed".into(),
        speed.to_string().into(),
        "--force".into(),
        "--output".into(),
        file.into(),
        "--".into(),
        file.into(),
    ]
}

fn optipng_args(level: u8, file: &Path) -> Vec<OsString> {
    vec![
        format!("-o{level}").into(),
        "-quiet".into(),
        "--".into(),
        file.into(),
    ]
}

fn zopfli_args(iterations: u32, file: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        format!("--iterations={iterations}").into(),
        "--filters=01234mepb".into(),
        file.into(),
        file.into(),
    ]
}

fn cwebp_args(params: &WebpParams) -> Vec<OsString> {
    vec![
        "-quiet".into(),
        "-q".into(),
        params.setting.quality.to_string().into(),
        "-m".into(),
        params.setting.method.to_string().into(),
        params.source.as_os_str().to_owned(),
        "-o".into(),
        params.output.as_os_str().to_owned(),
    ]
}

/// Run `program` once and map a non-zero exit to [`ToolError::Failed`].
fn run(tool: &'static str, program: &Path, args: &[OsString]) -> Result<(), ToolError> {
    debug!("{} {:?}", program.display(), args);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed {
            tool,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Lossless oxipng pass. The file is only rewritten when the result is smaller.
fn oxipng_in_place(file: &Path, preset: u8) -> Result<(), ToolError> {
    let data = std::fs::read(file)?;
    let options = oxipng::Options::from_preset(preset);
    let optimized = oxipng::optimize_from_memory(&data, &options)
        .map_err(|e| ToolError::Oxipng(format!("{}: {e}", file.display())))?;
    if optimized.len() < data.len() {
        std::fs::write(file, optimized)?;
    }
    Ok(())
}
