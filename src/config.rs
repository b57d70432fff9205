use crate::error::ConfigError;
use crate::fft::FftConfig;
use crate::window::WindowType;

pub const MIN_WINDOW_SIZE: usize = 4;
pub const MAX_WINDOW_SIZE: usize = 131072;

/// Window length used when no explicit length is requested.
/// At 44.1 kHz this is about 740 ms, long enough to resolve semitones in the bass.
pub const DEFAULT_WINDOW_SIZE: usize = 32768;

pub const DEFAULT_SKEW: f32 = 5.0;

/// Settings as the user sees them. Turned into an `FftConfig` with `to_fft_config()`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HighLevelConfig {
    pub window_type: WindowType,

    /// Exponent applied to the window position. 1 is symmetric.
    pub skew: f32,

    /// If set, the window covers at least this many milliseconds
    /// (rounded up to a power of two). Otherwise `DEFAULT_WINDOW_SIZE` samples.
    pub window_size_ms: Option<f32>,
}

impl Default for HighLevelConfig {
    fn default() -> Self {
        HighLevelConfig {
            window_type: WindowType::BlackmanHarris,
            skew: DEFAULT_SKEW,
            window_size_ms: None,
        }
    }
}

pub fn ms_to_samples(milliseconds: f32, sample_rate: u32) -> usize {
    (milliseconds as f64 * sample_rate as f64 / 1000.0).ceil() as usize
}

impl HighLevelConfig {
    /// Number of samples in the FFT window at `sample_rate`.
    pub fn window_size(&self, sample_rate: u32) -> Result<usize, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        match self.window_size_ms {
            None => Ok(DEFAULT_WINDOW_SIZE),
            Some(ms) => {
                if !ms.is_finite() || ms <= 0.0 {
                    return Err(ConfigError::InvalidWindowLength(ms));
                }
                let samples = ms_to_samples(ms, sample_rate).min(MAX_WINDOW_SIZE);
                Ok(samples
                    .next_power_of_two()
                    .clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE))
            }
        }
    }

    pub fn to_fft_config(&self, sample_rate: u32) -> Result<FftConfig, ConfigError> {
        if !self.skew.is_finite() || self.skew <= 0.0 {
            return Err(ConfigError::InvalidSkew(self.skew));
        }

        let window_size_samples = self.window_size(sample_rate)?;
        let mut window_factors = vec![0.0; window_size_samples];
        self.window_type.populate(&mut window_factors, self.skew);

        Ok(FftConfig {
            window_size_samples,
            window_factors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_maps_to_fixed_window() {
        let cfg = HighLevelConfig::default().to_fft_config(44100).unwrap();
        assert_eq!(cfg.window_size_samples, DEFAULT_WINDOW_SIZE);
        assert_eq!(cfg.window_factors.len(), DEFAULT_WINDOW_SIZE);
        assert!(cfg.validate().is_ok());

        // Skew 5 puts the Blackman-Harris peak well past the middle.
        let peak = cfg.window_factors.iter().cloned().fold(f32::MIN, f32::max);
        let peak_index = cfg.window_factors.iter().position(|&c| c == peak).unwrap();
        assert!(peak_index > DEFAULT_WINDOW_SIZE * 3 / 4);
    }

    #[test]
    fn window_length_in_ms() {
        let cfg = |ms| HighLevelConfig {
            window_size_ms: Some(ms),
            ..HighLevelConfig::default()
        };

        // 20 ms at 44.1 kHz = 882 samples, rounded up.
        assert_eq!(cfg(20.0).window_size(44100), Ok(1024));
        // Exactly a power of two stays put.
        assert_eq!(cfg(128.0).window_size(8000), Ok(1024));
        assert_eq!(cfg(0.01).window_size(8000), Ok(MIN_WINDOW_SIZE));
        assert_eq!(cfg(60_000.0).window_size(48000), Ok(MAX_WINDOW_SIZE));

        assert_eq!(
            cfg(-1.0).window_size(48000),
            Err(ConfigError::InvalidWindowLength(-1.0))
        );
        assert!(cfg(f32::NAN).window_size(48000).is_err());
    }

    #[test]
    fn rejects_bad_parameters() {
        let skewed = |skew| HighLevelConfig {
            skew,
            ..HighLevelConfig::default()
        };
        assert_eq!(
            skewed(0.0).to_fft_config(44100),
            Err(ConfigError::InvalidSkew(0.0))
        );
        assert!(skewed(f32::INFINITY).to_fft_config(44100).is_err());
        assert_eq!(
            HighLevelConfig::default().to_fft_config(0),
            Err(ConfigError::InvalidSampleRate)
        );
    }

    #[test]
    fn every_window_type_maps() {
        for &window_type in &WindowType::ALL {
            let cfg = HighLevelConfig {
                window_type,
                skew: 1.0,
                window_size_ms: Some(10.0),
            }
            .to_fft_config(48000)
            .unwrap();
            assert_eq!(cfg.window_size_samples, 512);
            assert!(cfg.validate().is_ok());
        }
    }
}
