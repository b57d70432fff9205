use crate::config::MIN_WINDOW_SIZE;
use crate::error::{ConfigError, EngineError};
use itertools::izip;
use num_complex::Complex;
use num_traits::Zero;
use realfft::{RealFftPlanner, RealToComplex};
use std::ops::Deref;
use std::sync::Arc;

pub type RealVec = Vec<f32>;

pub type FftSample = Complex<f32>;
pub type FftVec = Vec<FftSample>;

/// window_size_samples must be even and at least 4.
/// (It's probably nonsensical to use a size less than 32 or so.)
///
/// window_factors.len() must equal window_size_samples.
#[derive(Debug, Clone, PartialEq)]
pub struct FftConfig {
    pub window_size_samples: usize,
    pub window_factors: RealVec,
}

impl FftConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.window_size_samples;
        if size < MIN_WINDOW_SIZE || size % 2 != 0 {
            return Err(ConfigError::InvalidWindowSize(size));
        }
        if self.window_factors.len() != size {
            return Err(ConfigError::FactorCountMismatch {
                size,
                factors: self.window_factors.len(),
            });
        }
        Ok(())
    }

    /// Number of magnitudes produced per transform.
    pub fn spectrum_size(&self) -> usize {
        self.window_size_samples / 2 - 1
    }
}

/// Magnitude spectrum borrowed from a `WindowedFft`.
///
/// Bin k covers k * sample_rate / window_size Hz, for k in 0..window_size/2 - 1.
/// The view borrows the engine mutably, so it is gone by the next call on the engine.
#[derive(Debug, Copy, Clone)]
pub struct Spectrum<'a> {
    magnitudes: &'a [f32],
    window_size: usize,
}

impl<'a> Spectrum<'a> {
    pub fn magnitudes(&self) -> &'a [f32] {
        self.magnitudes
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Index and magnitude of the loudest bin, or None if the spectrum is empty.
    /// Ties go to the lowest bin.
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.magnitudes
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (bin, magnitude)| match best {
                Some((_, best_magnitude)) if best_magnitude >= magnitude => best,
                _ => Some((bin, magnitude)),
            })
    }

    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin_frequency(bin, self.window_size, sample_rate)
    }
}

impl Deref for Spectrum<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.magnitudes
    }
}

/// Center frequency of an FFT bin, in Hz.
pub fn bin_frequency(bin: usize, window_size: usize, sample_rate: u32) -> f32 {
    (bin as f64 * sample_rate as f64 / window_size as f64) as f32
}

fn try_zeroed<T: Zero + Clone>(what: &'static str, len: usize) -> Result<Vec<T>, EngineError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|source| EngineError::Allocation { what, len, source })?;
    buffer.resize(len, T::zero());
    Ok(buffer)
}

/// Holds the most recent window_size_samples samples, and recomputes
/// their windowed magnitude spectrum whenever samples are shifted in.
///
/// All buffers and the transform plan are allocated up front,
/// so the steady state (`consume_samples`, `clear`, same-size `update_from_config`)
/// never allocates.
pub struct WindowedFft {
    // User parameters. Only replaced by update_from_config().
    cfg: FftConfig,

    // Derived/cached data, bound to cfg.window_size_samples. Do not mutate.
    fft: Arc<dyn RealToComplex<f32>>,

    // Mutable state.
    /// Oldest sample first.
    samples: RealVec,
    fft_in: RealVec,
    fft_out: FftVec,
    scratch: FftVec,
    spectrum: RealVec,
}

impl WindowedFft {
    pub fn new(cfg: FftConfig) -> Result<WindowedFft, EngineError> {
        cfg.validate()?;
        let size = cfg.window_size_samples;

        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch_len = fft.get_scratch_len();

        Ok(WindowedFft {
            samples: try_zeroed("sample window", size)?,
            fft_in: try_zeroed("transform input", size)?,
            fft_out: try_zeroed("transform output", size / 2 + 1)?,
            scratch: try_zeroed("transform scratch", scratch_len)?,
            spectrum: try_zeroed("spectrum", cfg.spectrum_size())?,
            fft,
            cfg,
        })
    }

    pub fn config(&self) -> &FftConfig {
        &self.cfg
    }

    pub fn window_size(&self) -> usize {
        self.cfg.window_size_samples
    }

    pub fn spectrum_size(&self) -> usize {
        self.spectrum.len()
    }

    /// The current sample window, oldest first.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shift `incoming` into the end of the window (dropping as many of the oldest samples),
    /// then recompute the spectrum.
    ///
    /// Precondition: incoming.len() < window_size(). Use `replace_window` for a full window.
    ///
    /// Each magnitude is |X_k| / sqrt(N), for k in 0..N/2 - 1.
    /// The two highest bins (N/2 - 1 and Nyquist) are not reported.
    pub fn consume_samples(&mut self, incoming: &[f32]) -> Spectrum<'_> {
        let size = self.window_size();
        assert!(
            incoming.len() < size,
            "consume_samples() got {} samples, window holds {}",
            incoming.len(),
            size
        );

        let shift = incoming.len();
        self.samples.copy_within(shift.., 0);
        self.samples[size - shift..].copy_from_slice(incoming);

        self.run_fft()
    }

    /// Overwrite the entire window with `window` (oldest first),
    /// then recompute the spectrum.
    ///
    /// Precondition: window.len() == window_size().
    pub fn replace_window(&mut self, window: &[f32]) -> Spectrum<'_> {
        assert_eq!(window.len(), self.window_size());
        self.samples.copy_from_slice(window);
        self.run_fft()
    }

    /// Silence the sample window. Does not touch the plan or other buffers.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Apply a new config.
    ///
    /// If the window size is unchanged, only the coefficients are swapped
    /// and the sample window is kept.
    /// Otherwise the plan and every buffer are rebuilt (and the window starts silent).
    /// On error, `self` is left untouched.
    pub fn update_from_config(&mut self, cfg: FftConfig) -> Result<(), EngineError> {
        if cfg.window_size_samples != self.cfg.window_size_samples {
            // The plan is bound to the old size, so build a whole new engine.
            *self = WindowedFft::new(cfg)?;
            return Ok(());
        }

        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    /// Preconditions:
    /// - self.samples, self.fft_in and self.cfg.window_factors have length N
    ///   (via initialization).
    ///
    /// Postconditions:
    /// - self.spectrum contains the windowed magnitude spectrum of self.samples.
    /// - self.samples is unchanged.
    fn run_fft(&mut self) -> Spectrum<'_> {
        for (dst, &sample, &factor) in izip!(
            self.fft_in.iter_mut(),
            &self.samples,
            &self.cfg.window_factors
        ) {
            *dst = sample * factor;
        }

        self.fft
            .process_with_scratch(&mut self.fft_in, &mut self.fft_out, &mut self.scratch)
            .expect("transform buffers are sized by the plan");

        let scale = 1.0 / (self.window_size() as f32).sqrt();
        for (dst, bin) in self.spectrum.iter_mut().zip(&self.fft_out) {
            *dst = bin.norm() * scale;
        }

        Spectrum {
            magnitudes: &self.spectrum,
            window_size: self.cfg.window_size_samples,
        }
    }
}
