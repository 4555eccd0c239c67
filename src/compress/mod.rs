//! Compression stages and the WebP search.
//!
//! | Operation | Implementation |
//! |---|---|
//! | **Lossy quantize** | `pngquant` |
//! | **Lossless recompress** | `optipng` |
//! | **Brute-force deflate** | `zopflipng` |
//! | **Second lossless pass** | `oxipng` crate |
//! | **WebP encode** | `cwebp` |
//!
//! The module is split into:
//! - **Grid**: Pure functions for the search grid and savings math (unit testable)
//! - **Parameters**: Data structures describing stages and encodes
//! - **Backend**: [`Compressor`] trait + [`ExternalTools`]
//! - **Operations**: The pipeline and the search, combining grid + backend

pub mod backend;
pub mod external;
pub mod grid;
pub mod operations;
mod params;

pub use backend::{Compressor, ToolError};
pub use external::ExternalTools;
pub use grid::{savings_ratio, webp_grid};
pub use operations::{
    Attempt, PipelineOutcome, SearchOutcome, SkippedAttempt, optimize_png, search_webp,
};
pub use params::{PngStage, WebpParams, WebpSetting};
