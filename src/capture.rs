//! Microphone input through cpal, feeding a `SampleQueue`.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, Stream, StreamConfig};
use sample_queue::{RawSample, SampleQueue, SampleWriter};
use std::sync::Arc;

/// A running input stream on the default input device.
///
/// Dropping it stops the stream and clears the queue.
pub struct Capture {
    queue: Arc<SampleQueue>,
    sample_rate: u32,
    channels: u16,

    /// Always Some until dropped.
    stream: Option<Stream>,
}

impl Capture {
    pub fn start(queue: Arc<SampleQueue>) -> Result<Capture> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("no input device available")?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());

        let supported_config = device
            .default_input_config()
            .with_context(|| format!("no default input config for {}", device_name))?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        let writer = SampleWriter::new(Arc::clone(&queue), config.channels);
        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, writer)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, writer)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, writer)?,
            other => bail!("unsupported input sample format {:?}", other),
        };
        stream.play().context("failed to start input stream")?;

        log::info!(
            "capturing from '{}' ({} ch @ {} Hz, {:?}, buffer {:?})",
            device_name,
            config.channels,
            config.sample_rate.0,
            sample_format,
            config.buffer_size
        );

        Ok(Capture {
            queue,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            stream: Some(stream),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        // Stop the callback before clearing, or it could refill the queue.
        drop(self.stream.take());
        self.queue.clear();
    }
}

fn build_stream<S>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut writer: SampleWriter,
) -> Result<Stream>
where
    S: SizedSample + RawSample + Send + 'static,
{
    let err_fn = |err: cpal::StreamError| {
        log::error!("an error occurred on the input audio stream: {}", err)
    };

    let stream = device.build_input_stream(
        config,
        move |data: &[S], _: &cpal::InputCallbackInfo| writer.write(data),
        err_fn,
        None,
    )?;
    Ok(stream)
}
