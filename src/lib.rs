//! Turns a live audio stream into a sliding-window magnitude spectrum.
//!
//! A capture callback writes samples into a `SampleQueue` through a `SampleWriter`.
//! Once per frame, `SpectrumStreamer::tick` pulls the samples recorded since the last frame,
//! shifts them into a `WindowedFft`, and lends out the resulting `Spectrum`.

#[cfg(feature = "capture")]
pub mod capture;
pub mod config;
pub mod error;
pub mod fft;
pub mod streamer;
pub mod tone;
pub mod window;

pub use config::HighLevelConfig;
pub use error::{ConfigError, EngineError};
pub use fft::{FftConfig, Spectrum, WindowedFft};
pub use sample_queue::{RawSample, SampleQueue, SampleWriter};
pub use streamer::{Cadence, SpectrumStreamer};
pub use window::WindowType;
