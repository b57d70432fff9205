//! Window coefficients, with an optional skew that pushes the window's peak
//! towards the newest samples.
//!
//! Every function evaluates the textbook formula at x = (i / (N-1))^skew
//! instead of i / (N-1). skew = 1 gives the symmetric window.
//! Larger skews move the rising edge later and the peak closer to the end,
//! weighting recent samples more (less latency and ringing, more blur).

use crate::error::ConfigError;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// How to window the FFT to reduce sidelobes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowType {
    Hamming,
    BlackmanHarris,
    Rectangle,
}

impl WindowType {
    pub const ALL: [WindowType; 3] = [
        WindowType::Hamming,
        WindowType::BlackmanHarris,
        WindowType::Rectangle,
    ];

    /// Fill `factors` with this window, skewed by `skew`.
    /// Rectangle ignores `skew`.
    pub fn populate(self, factors: &mut [f32], skew: f32) {
        match self {
            WindowType::Hamming => populate_hamming(factors, skew),
            WindowType::BlackmanHarris => populate_blackman_harris(factors, skew),
            WindowType::Rectangle => populate_rectangle(factors),
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WindowType::Hamming => "Hamming",
            WindowType::BlackmanHarris => "Blackman-Harris",
            WindowType::Rectangle => "Rectangle",
        })
    }
}

impl FromStr for WindowType {
    type Err = ConfigError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        match src.to_ascii_lowercase().as_str() {
            "hamming" => Ok(WindowType::Hamming),
            "blackman-harris" | "blackmanharris" => Ok(WindowType::BlackmanHarris),
            "rectangle" | "rect" => Ok(WindowType::Rectangle),
            _ => Err(ConfigError::UnsupportedWindow(src.to_owned())),
        }
    }
}

/// Yields (coefficient slot, skewed x) for every index.
fn skewed_positions<'a>(
    factors: &'a mut [f32],
    skew: f32,
) -> impl Iterator<Item = (&'a mut f32, f64)> + 'a {
    // N = 1 would divide by zero; treat it like N = 2 so x(0) = 0.
    let denom = (factors.len().max(2) - 1) as f64;
    let skew = skew as f64;

    factors
        .iter_mut()
        .enumerate()
        .map(move |(i, slot)| (slot, (i as f64 / denom).powf(skew)))
}

pub fn populate_hamming(factors: &mut [f32], skew: f32) {
    for (slot, x) in skewed_positions(factors, skew) {
        *slot = (0.54 - 0.46 * (2.0 * PI * x).cos()) as f32;
    }
}

pub fn populate_blackman_harris(factors: &mut [f32], skew: f32) {
    for (slot, x) in skewed_positions(factors, skew) {
        *slot = (0.35875 - 0.48829 * (2.0 * PI * x).cos() + 0.14128 * (4.0 * PI * x).cos()
            - 0.01168 * (6.0 * PI * x).cos()) as f32;
    }
}

pub fn populate_rectangle(factors: &mut [f32]) {
    factors.fill(1.0);
}
