//! A sine generator standing in for a capture device.
//!
//! Produces interleaved i16 blocks in real time on its own thread
//! and feeds them through a `SampleWriter`, like a device callback would.

use sample_queue::SampleWriter;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sine oscillator with continuous phase across blocks.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f64,
    step: f64,
    amplitude: f32,
}

impl Oscillator {
    /// amplitude is relative to full scale, and clamped to [0, 1].
    pub fn new(frequency: f32, sample_rate: u32, amplitude: f32) -> Oscillator {
        Oscillator {
            phase: 0.0,
            step: TAU * frequency as f64 / sample_rate as f64,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }

    fn next_sample(&mut self) -> f32 {
        let value = self.phase.sin() as f32 * self.amplitude;
        self.phase = (self.phase + self.step) % TAU;
        value
    }

    /// Fill `out` with interleaved frames, the same value in every channel.
    pub fn fill_i16(&mut self, out: &mut [i16], channels: usize) {
        for frame in out.chunks_mut(channels) {
            let value = (self.next_sample() * 32767.0) as i16;
            frame.fill(value);
        }
    }
}

/// Background thread writing a tone into a queue at `sample_rate`.
/// Stops when dropped.
pub struct ToneSource {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ToneSource {
    pub fn spawn(
        mut writer: SampleWriter,
        mut oscillator: Oscillator,
        sample_rate: u32,
        block_frames: usize,
    ) -> ToneSource {
        let running = Arc::new(AtomicBool::new(true));
        let block_frames = block_frames.max(1);
        let block_time = Duration::from_secs_f64(block_frames as f64 / sample_rate as f64);

        log::info!(
            "tone source started: {} Hz sample rate, {} frames per block",
            sample_rate,
            block_frames
        );

        let thread = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let channels = writer.channels() as usize;
                let mut block = vec![0i16; block_frames * channels];
                let mut deadline = Instant::now();

                while running.load(Ordering::Acquire) {
                    oscillator.fill_i16(&mut block, channels);
                    writer.write(&block);

                    // Sleep to an absolute deadline, so generation time does not add up.
                    deadline += block_time;
                    spin_sleep::sleep(deadline.saturating_duration_since(Instant::now()));
                }
            })
        };

        ToneSource {
            running,
            thread: Some(thread),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("tone source thread panicked");
            }
        }
    }
}

impl Drop for ToneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sample_queue::SampleQueue;

    #[test]
    fn oscillator_phase_is_continuous() {
        let mut whole = Oscillator::new(1000.0, 8000, 1.0);
        let mut split = whole.clone();

        let mut expected = vec![0i16; 16];
        whole.fill_i16(&mut expected, 1);

        let mut first = vec![0i16; 5];
        let mut second = vec![0i16; 11];
        split.fill_i16(&mut first, 1);
        split.fill_i16(&mut second, 1);
        first.extend_from_slice(&second);

        assert_eq!(first, expected);
        // 1 kHz at 8 kHz: peak every 8 samples, at index 2.
        assert_eq!(expected[2], 32767);
        assert_eq!(expected[10], 32767);
    }

    #[test]
    fn stereo_frames_repeat_value() {
        let mut oscillator = Oscillator::new(440.0, 48000, 0.5);
        let mut block = vec![0i16; 20];
        oscillator.fill_i16(&mut block, 2);
        for frame in block.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn source_fills_queue_until_stopped() {
        let queue = Arc::new(SampleQueue::new());
        let writer = SampleWriter::new(Arc::clone(&queue), 2);

        let mut source = ToneSource::spawn(writer, Oscillator::new(440.0, 8000, 0.5), 8000, 64);
        let start = Instant::now();
        while queue.available_count() < 256 {
            assert!(start.elapsed() < Duration::from_secs(5), "no samples arrived");
            thread::sleep(Duration::from_millis(1));
        }
        source.stop();

        let after_stop = queue.available_count();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(queue.available_count(), after_stop);
        // Whole stereo blocks downmixed to mono.
        assert_eq!(after_stop % 64, 0);
    }
}
