//! Error types for the spectrum pipeline.

use std::collections::TryReserveError;
use thiserror::Error;

/// A window configuration which cannot be turned into an `FftConfig`,
/// or an `FftConfig` the engine refuses.
///
/// Recoverable: callers keep their previous configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Window name not recognized by `WindowType::from_str`.
    #[error("unsupported window type {0:?} (expected hamming, blackman-harris or rectangle)")]
    UnsupportedWindow(String),

    #[error("skew factor {0} must be finite and positive")]
    InvalidSkew(f32),

    #[error("window length {0} ms must be finite and positive")]
    InvalidWindowLength(f32),

    #[error("sample rate must be nonzero")]
    InvalidSampleRate,

    /// Odd or too short for a non-empty spectrum.
    #[error("window size {0} must be even and at least 4")]
    InvalidWindowSize(usize),

    #[error("window has {factors} coefficients but {size} samples")]
    FactorCountMismatch { size: usize, factors: usize },
}

/// Failure to construct or rebuild a `WindowedFft`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid FFT config: {0}")]
    Config(#[from] ConfigError),

    /// Fatal. The engine cannot run without its buffers.
    #[error("failed to allocate {what} ({len} elements)")]
    Allocation {
        what: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },
}
