//! Pure calculations for the WebP search and savings accounting.
//!
//! All functions here are pure and testable without any I/O or tools.

use super::params::WebpSetting;

/// Build the search grid: every quality crossed with every method.
///
/// Quality is the outer loop, so the grid is ordered
/// `(q0, m0), (q0, m1), …, (q1, m0), …`. That order is also the tie-break
/// order in [`pick_smallest`].
pub fn webp_grid(qualities: &[u8], methods: &[u8]) -> Vec<WebpSetting> {
    qualities
        .iter()
        .flat_map(|&quality| {
            methods
                .iter()
                .map(move |&method| WebpSetting { quality, method })
        })
        .collect()
}

/// Index of the smallest size; the earliest one wins a tie.
pub fn pick_smallest(sizes: &[u64]) -> Option<usize> {
    sizes
        .iter()
        .enumerate()
        .min_by_key(|&(_, size)| *size)
        .map(|(i, _)| i)
}

/// Savings as a percentage of the original size.
///
/// Zero when nothing was saved (or the file grew, or the original is empty).
pub fn savings_ratio(original: u64, final_size: u64) -> f64 {
    if original == 0 || final_size >= original {
        return 0.0;
    }
    (original - final_size) as f64 / original as f64 * 100.0
}
