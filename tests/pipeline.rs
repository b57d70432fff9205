//! End-to-end behaviour: writer -> queue -> streamer -> spectrum.

use spectro_stream::tone::{Oscillator, ToneSource};
use spectro_stream::{HighLevelConfig, SampleWriter, SpectrumStreamer, WindowType};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SAMPLE_RATE: u32 = 8000;

/// 1024 samples at 8 kHz, so bins are 7.8125 Hz apart and 1 kHz is bin 128.
fn hl_config(window_type: WindowType, skew: f32) -> HighLevelConfig {
    HighLevelConfig {
        window_type,
        skew,
        window_size_ms: Some(128.0),
    }
}

fn write_tone(writer: &mut SampleWriter, oscillator: &mut Oscillator, frames: usize) {
    let channels = writer.channels() as usize;
    let mut block = vec![0i16; frames * channels];
    oscillator.fill_i16(&mut block, channels);
    writer.write(&block);
}

#[test]
fn tone_peaks_at_its_bin() {
    for &(window_type, skew) in &[
        (WindowType::Rectangle, 1.0),
        (WindowType::Hamming, 1.0),
        (WindowType::BlackmanHarris, 5.0),
    ] {
        let mut streamer = SpectrumStreamer::new(hl_config(window_type, skew), SAMPLE_RATE).unwrap();
        let mut writer = SampleWriter::new(Arc::clone(streamer.queue()), 2);
        let mut oscillator = Oscillator::new(1000.0, SAMPLE_RATE, 0.5);

        write_tone(&mut writer, &mut oscillator, 3000);

        // A full window at once, then two partial shifts.
        for &request in &[1024, 500, 500] {
            let spectrum = streamer.update_fft(request).unwrap();
            let (bin, _) = spectrum.peak().unwrap();
            assert_eq!(bin, 128, "{} skew {}", window_type, skew);
            assert_eq!(spectrum.bin_frequency(bin, SAMPLE_RATE), 1000.0);
        }
        assert_eq!(streamer.backlog(), 3000 - 2024);
    }
}

#[test]
fn reconfigure_mid_stream() {
    let mut streamer =
        SpectrumStreamer::new(hl_config(WindowType::Rectangle, 1.0), SAMPLE_RATE).unwrap();
    let mut writer = SampleWriter::new(Arc::clone(streamer.queue()), 1);
    let mut oscillator = Oscillator::new(500.0, SAMPLE_RATE, 0.5);

    write_tone(&mut writer, &mut oscillator, 1000);
    assert!(streamer.update_fft(1000).is_some());

    // Same length: samples survive, the tone is still there.
    streamer
        .reconfigure(hl_config(WindowType::Hamming, 2.0))
        .unwrap();
    assert_eq!(streamer.update_fft(0).map(|s| s.len()), None);
    write_tone(&mut writer, &mut oscillator, 10);
    assert_eq!(streamer.update_fft(10).unwrap().peak().unwrap().0, 64);

    // Twice the length: the window restarts silent and has twice the bins.
    let longer = HighLevelConfig {
        window_size_ms: Some(256.0),
        ..hl_config(WindowType::Hamming, 2.0)
    };
    streamer.reconfigure(longer).unwrap();
    assert!(streamer.fft().samples().iter().all(|&s| s == 0.0));

    write_tone(&mut writer, &mut oscillator, 2047);
    let spectrum = streamer.update_fft(2047).unwrap();
    assert_eq!(spectrum.len(), 1023);
    assert_eq!(spectrum.peak().unwrap().0, 128);
}

/// A capture thread pushing while the consumer pulls in odd-sized chunks:
/// the window always holds a contiguous, increasing run of the input.
#[test]
fn concurrent_capture_preserves_order() {
    const TOTAL: usize = 50_000;

    let mut streamer =
        SpectrumStreamer::new(hl_config(WindowType::Rectangle, 1.0), SAMPLE_RATE).unwrap();
    let queue = Arc::clone(streamer.queue());

    let capture_thread = thread::spawn(move || {
        let mut writer = SampleWriter::new(queue, 1);
        let mut next = 1usize;
        while next <= TOTAL {
            let end = (next + 63).min(TOTAL + 1);
            let block: Vec<f32> = (next..end).map(|x| x as f32).collect();
            writer.write(&block);
            next = end;
        }
    });

    let mut last = 0.0f32;
    while last < TOTAL as f32 {
        if streamer.update_fft(333).is_none() {
            thread::yield_now();
            continue;
        }

        let samples = streamer.fft().samples();
        let filled: Vec<f32> = samples.iter().copied().filter(|&s| s != 0.0).collect();
        assert!(filled.windows(2).all(|pair| pair[1] == pair[0] + 1.0));
        last = *samples.last().unwrap();
    }
    capture_thread.join().unwrap();

    assert_eq!(streamer.backlog(), 0);
    assert_eq!(streamer.fft().samples()[1023], TOTAL as f32);
}

/// Real threads and real time: a tone source running at 8 kHz,
/// and a consumer ticking with measured elapsed time.
#[test]
fn live_tone_source() {
    let mut streamer =
        SpectrumStreamer::new(hl_config(WindowType::BlackmanHarris, 5.0), SAMPLE_RATE).unwrap();
    let writer = SampleWriter::new(Arc::clone(streamer.queue()), 1);
    let mut source = ToneSource::spawn(
        writer,
        Oscillator::new(1000.0, SAMPLE_RATE, 0.5),
        SAMPLE_RATE,
        16,
    );

    let started = Instant::now();
    let mut last_tick = started;
    let mut peak_bin = None;

    // Four windows' worth of audio, so the last spectrum sees only the tone.
    while started.elapsed() < Duration::from_millis(512) {
        thread::sleep(Duration::from_millis(4));

        let now = Instant::now();
        if let Some(spectrum) = streamer.tick(now - last_tick) {
            peak_bin = spectrum.peak().map(|(bin, _)| bin);
        }
        last_tick = now;
    }
    source.stop();

    assert_eq!(peak_bin, Some(128));
}
