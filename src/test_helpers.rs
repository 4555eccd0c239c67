//! Shared test utilities for the pngpress test suite.
//!
//! Fixtures are generated on the fly instead of checked in, so every test
//! gets real, decodable PNGs in its own temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_png(&tmp.path().join("a.png"), 16, 16);
//! let inputs = png_inputs(tmp.path(), &["a.png"]);
//! ```

use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

use crate::scan::InputImage;

/// Write a gradient PNG of `width`×`height`.
///
/// The gradient keeps the file compressible but not trivially so, which is
/// what the lossless passes need to show a difference.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

/// Describe existing files under `root` as scan results, in the given order.
pub fn png_inputs(root: &Path, names: &[&str]) -> Vec<InputImage> {
    names
        .iter()
        .map(|name| {
            let path = root.join(name);
            let size = std::fs::metadata(&path).unwrap().len();
            InputImage {
                path,
                filename: name.to_string(),
                size,
            }
        })
        .collect()
}
