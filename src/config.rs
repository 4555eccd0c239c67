//! Run configuration module.
//!
//! Handles loading, validating, and merging `pngpress.toml`. Stock defaults
//! are overridden by an optional `pngpress.toml` in the working directory,
//! and CLI flags (`--jobs`, `--no-webp`) override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [png]
//! quality = [65, 80]        # pngquant --quality min-max
//! speed = 1                 # pngquant --speed (1 = slowest, best)
//! optipng_level = 7         # optipng -o level (0-7)
//! zopfli_iterations = 15    # zopflipng --iterations
//! second_pass = true        # in-process oxipng pass after zopflipng
//! oxipng_preset = 4         # oxipng preset (0-6)
//!
//! [webp]
//! enabled = true
//! methods = [4, 5, 6]       # cwebp -m values to try
//!
//! [webp.quality]
//! start = 10                # first cwebp -q value
//! end = 60                  # last cwebp -q value (inclusive)
//! step = 5
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "pngpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `pngpress.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// PNG pipeline settings.
    pub png: PngConfig,
    /// WebP search grid.
    pub webp: WebpConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within the ranges the tools accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [qmin, qmax] = self.png.quality;
        if qmin > qmax || qmax > 100 {
            return Err(ConfigError::Validation(
                "png.quality must be [min, max] with min <= max <= 100".into(),
            ));
        }
        if !(1..=11).contains(&self.png.speed) {
            return Err(ConfigError::Validation("png.speed must be 1-11".into()));
        }
        if self.png.optipng_level > 7 {
            return Err(ConfigError::Validation(
                "png.optipng_level must be 0-7".into(),
            ));
        }
        if self.png.zopfli_iterations == 0 {
            return Err(ConfigError::Validation(
                "png.zopfli_iterations must be at least 1".into(),
            ));
        }
        if self.png.oxipng_preset > 6 {
            return Err(ConfigError::Validation(
                "png.oxipng_preset must be 0-6".into(),
            ));
        }

        let q = &self.webp.quality;
        if q.step == 0 {
            return Err(ConfigError::Validation(
                "webp.quality.step must be non-zero".into(),
            ));
        }
        if q.start > q.end || q.end > 100 {
            return Err(ConfigError::Validation(
                "webp.quality must satisfy start <= end <= 100".into(),
            ));
        }
        if self.webp.methods.is_empty() {
            return Err(ConfigError::Validation(
                "webp.methods must not be empty".into(),
            ));
        }
        if let Some(m) = self.webp.methods.iter().find(|m| **m > 6) {
            return Err(ConfigError::Validation(format!(
                "webp.methods values must be 0-6, got {m}"
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// PNG pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngConfig {
    /// pngquant quality range as `[min, max]`.
    pub quality: [u8; 2],
    /// pngquant speed/quality trade-off (1 = brute force, 11 = fastest).
    pub speed: u8,
    /// optipng optimization level.
    pub optipng_level: u8,
    /// zopflipng iteration count.
    pub zopfli_iterations: u32,
    /// Run the in-process oxipng pass after zopflipng.
    pub second_pass: bool,
    /// oxipng preset for the second pass.
    pub oxipng_preset: u8,
}

impl Default for PngConfig {
    fn default() -> Self {
        Self {
            quality: [65, 80],
            speed: 1,
            optipng_level: 7,
            zopfli_iterations: 15,
            second_pass: true,
            oxipng_preset: 4,
        }
    }
}

/// WebP conversion search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpConfig {
    /// Disable to skip the WebP stage even when cwebp is installed.
    pub enabled: bool,
    /// Quality levels to try.
    pub quality: QualitySteps,
    /// cwebp `-m` effort levels to try for every quality level.
    pub methods: Vec<u8>,
}

impl Default for WebpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: QualitySteps::default(),
            methods: vec![4, 5, 6],
        }
    }
}

/// An inclusive stepped range of quality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualitySteps {
    pub start: u8,
    pub end: u8,
    pub step: u8,
}

impl Default for QualitySteps {
    fn default() -> Self {
        Self {
            start: 10,
            end: 60,
            step: 5,
        }
    }
}

impl QualitySteps {
    /// Every quality level in the range, ascending. Empty when `step` is zero.
    pub fn levels(&self) -> Vec<u8> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..=self.end).step_by(self.step as usize).collect()
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Config::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `pngpress.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `pngpress.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `pngpress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pngpress configuration
# ======================
# Place this file as pngpress.toml in the directory you optimize.
# All settings are optional; values shown are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# PNG pipeline: pngquant -> optipng -> zopflipng -> oxipng (optional)
# ---------------------------------------------------------------------------
[png]
# pngquant --quality range as [min, max] (0-100).
quality = [65, 80]

# pngquant --speed, 1 (slowest, smallest) to 11 (fastest).
speed = 1

# optipng -o level, 0-7.
optipng_level = 7

# zopflipng --iterations. Higher is slower and marginally smaller.
zopfli_iterations = 15

# Run a final lossless oxipng pass after zopflipng.
second_pass = true

# oxipng preset, 0-6.
oxipng_preset = 4

# ---------------------------------------------------------------------------
# WebP search: every quality x method combination is encoded with cwebp and
# only the smallest result is kept.
# ---------------------------------------------------------------------------
[webp]
# Set to false to skip WebP conversion even when cwebp is installed.
enabled = true

# cwebp -m effort levels, 0-6.
methods = [4, 5, 6]

# cwebp -q levels: start..=end in increments of step.
[webp.quality]
start = 10
end = 60
step = 5

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
