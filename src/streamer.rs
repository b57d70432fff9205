//! Paces samples from the capture queue into the FFT engine.

use crate::config::HighLevelConfig;
use crate::error::EngineError;
use crate::fft::{FftConfig, RealVec, Spectrum, WindowedFft};
use sample_queue::SampleQueue;
use std::sync::Arc;
use std::time::Duration;

/// Converts elapsed time into a whole number of samples,
/// carrying the fractional remainder so rounding never accumulates.
#[derive(Debug, Default, Copy, Clone)]
pub struct Cadence {
    owed: f64,
}

impl Cadence {
    pub fn new() -> Cadence {
        Cadence::default()
    }

    /// Samples due after `elapsed` more time at `sample_rate`.
    pub fn advance(&mut self, elapsed: Duration, sample_rate: u32) -> usize {
        self.owed += elapsed.as_secs_f64() * sample_rate as f64;
        let whole = self.owed.floor();
        self.owed -= whole;
        whole as usize
    }

    /// Fraction of a sample carried into the next tick. Always in [0, 1).
    pub fn owed(&self) -> f64 {
        self.owed
    }

    pub fn reset(&mut self) {
        self.owed = 0.0;
    }
}

/// Owns the capture queue's consumer side and the FFT engine,
/// and turns per-frame time deltas into spectrum updates.
///
/// Must be driven from a single thread.
/// The capture thread only touches the queue (through a `SampleWriter`).
pub struct SpectrumStreamer {
    queue: Arc<SampleQueue>,
    fft: WindowedFft,
    hl_config: HighLevelConfig,
    sample_rate: u32,
    cadence: Cadence,

    /// Samples pulled from the queue this tick. Reused across ticks.
    pulled: RealVec,
}

impl SpectrumStreamer {
    /// Create a streamer with a fresh, empty queue.
    pub fn new(hl_config: HighLevelConfig, sample_rate: u32) -> Result<Self, EngineError> {
        Self::with_queue(Arc::new(SampleQueue::new()), hl_config, sample_rate)
    }

    /// Create a streamer reading from an existing queue
    /// (typically one a capture stream is already writing to).
    pub fn with_queue(
        queue: Arc<SampleQueue>,
        hl_config: HighLevelConfig,
        sample_rate: u32,
    ) -> Result<Self, EngineError> {
        let fft = WindowedFft::new(hl_config.to_fft_config(sample_rate)?)?;
        log::debug!(
            "{} window, skew {}, {} samples at {} Hz",
            hl_config.window_type,
            hl_config.skew,
            fft.window_size(),
            sample_rate
        );

        Ok(SpectrumStreamer {
            pulled: Vec::with_capacity(fft.window_size()),
            queue,
            fft,
            hl_config,
            sample_rate,
            cadence: Cadence::new(),
        })
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    pub fn fft(&self) -> &WindowedFft {
        &self.fft
    }

    pub fn fft_config(&self) -> &FftConfig {
        self.fft.config()
    }

    pub fn hl_config(&self) -> &HighLevelConfig {
        &self.hl_config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples captured but not yet consumed.
    pub fn backlog(&self) -> usize {
        self.queue.available_count()
    }

    /// Advance by `elapsed` wall-clock time, and pull the samples recorded in that time.
    ///
    /// Return: the new spectrum, or None if no samples were available.
    /// None means "nothing changed this tick", not an error.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Spectrum<'_>> {
        let samples_to_load = self.cadence.advance(elapsed, self.sample_rate);
        self.update_fft(samples_to_load)
    }

    /// Pull up to `samples_to_load` samples from the queue and shift them into the window.
    ///
    /// At most one window is processed per call.
    /// If more is requested, the oldest queued samples beyond one window are discarded,
    /// so latency stays bounded when the consumer falls behind.
    pub fn update_fft(&mut self, mut samples_to_load: usize) -> Option<Spectrum<'_>> {
        let size = self.fft.window_size();

        if samples_to_load >= size {
            // Discard what we will be unable to use, keeping the newest window's worth.
            let excess = samples_to_load
                .min(self.queue.available_count())
                .saturating_sub(size);
            if excess > 0 {
                let discarded = self.queue.discard_oldest(excess);
                log::debug!("fell behind, skipped {} samples", discarded);
            }
            samples_to_load = size;
        }

        let pulled = self.queue.consume_oldest(&mut self.pulled, samples_to_load);
        if pulled == 0 {
            return None;
        }

        Some(if pulled == size {
            self.fft.replace_window(&self.pulled)
        } else {
            self.fft.consume_samples(&self.pulled)
        })
    }

    /// Switch to new user settings.
    ///
    /// On error nothing changes, and the previous settings stay in effect.
    pub fn reconfigure(&mut self, hl_config: HighLevelConfig) -> Result<(), EngineError> {
        if hl_config == self.hl_config {
            return Ok(());
        }
        self.apply(hl_config, self.sample_rate)
    }

    /// Follow a change in capture sample rate.
    /// The window length changes only if it is given in milliseconds.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), EngineError> {
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        self.apply(self.hl_config, sample_rate)
    }

    fn apply(&mut self, hl_config: HighLevelConfig, sample_rate: u32) -> Result<(), EngineError> {
        let cfg = hl_config.to_fft_config(sample_rate)?;
        let old_size = self.fft.window_size();

        self.fft.update_from_config(cfg)?;
        self.hl_config = hl_config;
        self.sample_rate = sample_rate;

        if self.fft.window_size() != old_size {
            log::debug!(
                "rebuilt FFT: {} -> {} samples",
                old_size,
                self.fft.window_size()
            );
        }
        Ok(())
    }

    /// Drop the whole backlog, so the next tick shows live audio.
    ///
    /// Return: how many samples were skipped.
    pub fn catch_up(&mut self) -> usize {
        self.queue.discard_oldest(usize::MAX)
    }

    /// Forget all captured audio: empty the queue and silence the window.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.fft.clear();
        self.cadence.reset();
    }
}
