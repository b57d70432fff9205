use anyhow::{Error, Result};
use spectro_stream::config::HighLevelConfig;
use spectro_stream::tone::{Oscillator, ToneSource};
use spectro_stream::{SampleQueue, SampleWriter, SpectrumStreamer, WindowType};
use spin_sleep::LoopHelper;
use std::sync::Arc;
use std::time::Instant;
use structopt::StructOpt;

#[cfg(feature = "capture")]
use spectro_stream::capture::Capture;

fn parse_positive(src: &str, what: &str) -> Result<f32> {
    let num: f32 = src
        .parse()
        .map_err(|_| Error::msg(format!("{} {} must be a number", what, src)))?;
    if !num.is_finite() || num <= 0.0 {
        return Err(Error::msg(format!("{} {} must be > 0", what, src)));
    }
    Ok(num)
}

fn parse_skew(src: &str) -> Result<f32> {
    parse_positive(src, "Skew factor")
}

fn parse_window_ms(src: &str) -> Result<f32> {
    parse_positive(src, "Window length")
}

fn parse_tone(src: &str) -> Result<f32> {
    parse_positive(src, "Tone frequency")
}

fn parse_tick_rate(src: &str) -> Result<f64> {
    Ok(parse_positive(src, "Tick rate")? as f64)
}

fn parse_sample_rate(src: &str) -> Result<u32> {
    let num: u32 = src
        .parse()
        .map_err(|_| Error::msg(format!("Sample rate {} must be an integer", src)))?;
    if num == 0 {
        return Err(Error::msg("Sample rate must be > 0"));
    }
    Ok(num)
}

/// Real-time sliding-window spectrum of the microphone input
#[derive(StructOpt, Debug)]
#[structopt(name = "spectro-stream")]
pub struct Opt {
    /// Window function: hamming, blackman-harris or rectangle.
    #[structopt(short, long, default_value = "blackman-harris")]
    window: WindowType,

    /// Exponent applied to the window position.
    /// 1 gives the symmetric window. Higher values weight recent samples more,
    /// reducing latency and ringing at the cost of frequency blur.
    #[structopt(short, long, default_value = "5.0", parse(try_from_str = parse_skew))]
    skew: f32,

    /// FFT window length in milliseconds, rounded up to a power of two samples.
    /// If omitted, 32768 samples are used.
    #[structopt(long, parse(try_from_str = parse_window_ms))]
    window_ms: Option<f32>,

    /// If passed, analyze a generated sine of this frequency (Hz)
    /// instead of the microphone.
    #[structopt(long, parse(try_from_str = parse_tone))]
    tone: Option<f32>,

    /// Sample rate of the generated tone.
    /// The microphone always uses its device's rate.
    #[structopt(long, default_value = "44100", parse(try_from_str = parse_sample_rate))]
    sample_rate: u32,

    /// Spectrum updates per second.
    #[structopt(long, default_value = "240", parse(try_from_str = parse_tick_rate))]
    tick_rate: f64,

    /// Seconds between status lines.
    #[structopt(long, default_value = "1")]
    report_interval: f64,

    /// Stop after this many seconds. Runs until killed if omitted.
    #[structopt(long)]
    seconds: Option<f64>,
}

/// Keeps the audio producer alive until dropped.
#[allow(dead_code)]
enum Source {
    Tone(ToneSource),
    #[cfg(feature = "capture")]
    Microphone(Capture),
}

fn start_tone(opt: &Opt, queue: &Arc<SampleQueue>, frequency: f32) -> (Source, u32) {
    let writer = SampleWriter::new(Arc::clone(queue), 1);
    let oscillator = Oscillator::new(frequency, opt.sample_rate, 0.5);

    // 1 ms blocks, like a small device buffer.
    let block_frames = (opt.sample_rate / 1000).max(1) as usize;
    let source = ToneSource::spawn(writer, oscillator, opt.sample_rate, block_frames);
    (Source::Tone(source), opt.sample_rate)
}

#[cfg(feature = "capture")]
fn start_microphone(queue: &Arc<SampleQueue>) -> Result<(Source, u32)> {
    let capture = Capture::start(Arc::clone(queue))?;
    let sample_rate = capture.sample_rate();
    Ok((Source::Microphone(capture), sample_rate))
}

#[cfg(not(feature = "capture"))]
fn start_microphone(_queue: &Arc<SampleQueue>) -> Result<(Source, u32)> {
    Err(Error::msg(
        "built without microphone support; pass --tone <HZ> or rebuild with --features capture",
    ))
}

fn run(opt: &Opt, streamer: &mut SpectrumStreamer) {
    let sample_rate = streamer.sample_rate();
    let mut loop_helper = LoopHelper::builder()
        .report_interval_s(opt.report_interval)
        .build_with_target_rate(opt.tick_rate);

    let started = Instant::now();
    let mut updates = 0usize;
    // (frequency, magnitude) of the loudest bin in the latest spectrum.
    let mut peak: Option<(f32, f32)> = None;

    loop {
        let elapsed = loop_helper.loop_start();

        if let Some(spectrum) = streamer.tick(elapsed) {
            updates += 1;
            peak = spectrum
                .peak()
                .map(|(bin, magnitude)| (spectrum.bin_frequency(bin, sample_rate), magnitude));
        }

        if let Some(tick_rate) = loop_helper.report_rate() {
            let backlog = streamer.backlog();
            match peak {
                Some((frequency, magnitude)) => log::info!(
                    "{:.0} ticks/s, {} updates, backlog {} samples, peak {:.1} Hz ({:.4})",
                    tick_rate,
                    updates,
                    backlog,
                    frequency,
                    magnitude
                ),
                None => log::info!("{:.0} ticks/s, waiting for audio", tick_rate),
            }
            updates = 0;

            if backlog > streamer.fft().window_size() {
                let skipped = streamer.catch_up();
                log::warn!("backlog exceeded one window, skipped {} samples", skipped);
            }
        }

        if let Some(seconds) = opt.seconds {
            if started.elapsed().as_secs_f64() >= seconds {
                break;
            }
        }

        loop_helper.loop_sleep();
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let opt = Opt::from_args();

    let hl_config = HighLevelConfig {
        window_type: opt.window,
        skew: opt.skew,
        window_size_ms: opt.window_ms,
    };
    let queue = Arc::new(SampleQueue::new());
    let (source, sample_rate) = match opt.tone {
        Some(frequency) => start_tone(&opt, &queue, frequency),
        None => start_microphone(&queue)?,
    };

    let mut streamer = SpectrumStreamer::with_queue(queue, hl_config, sample_rate)?;
    log::info!(
        "{} window (skew {}), {} samples = {:.0} ms, {} bins",
        hl_config.window_type,
        hl_config.skew,
        streamer.fft().window_size(),
        streamer.fft().window_size() as f64 * 1000.0 / sample_rate as f64,
        streamer.fft().spectrum_size()
    );

    run(&opt, &mut streamer);

    drop(source);
    streamer.stop();
    Ok(())
}
