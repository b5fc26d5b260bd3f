use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::HeapProd;
use ringbuf::traits::{Consumer, Producer, Split};
use rubato::{FastFixedIn, Resampler};

use crate::audio;
use crate::device;

/// Seconds of decoded speech the output ring buffer can hold.
const OUTPUT_LATENCY_SECONDS: usize = 2;
/// Input chunk size of the playback resampler.
const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Queue of decoded interviewer speech headed for the output device.
/// Enqueueing never blocks the caller; feeding the device is the playback
/// thread's problem.
pub struct PlaybackSink {
    tx: std_mpsc::Sender<Vec<f32>>,
}

impl PlaybackSink {
    pub fn enqueue(&self, samples: Vec<f32>) {
        let _ = self.tx.send(samples);
    }
}

/// Opens the output device and starts the playback thread. Enqueued samples
/// at `source_sample_rate` are resampled to whatever rate the device runs
/// at. The cpal stream is `!Send`, so it lives on that thread until the
/// sink is dropped.
pub fn start_output(device_name: Option<String>, source_sample_rate: f64) -> Result<PlaybackSink> {
    let (tx, rx) = std_mpsc::channel::<Vec<f32>>();
    let (ready_tx, ready_rx) = std_mpsc::channel();

    std::thread::spawn(move || {
        let opened = (|| -> Result<(cpal::Stream, HeapProd<f32>, FastFixedIn<f32>)> {
            let output = device::get_or_default_output(device_name)?;
            let default_config = output
                .default_output_config()
                .context("no default output config")?;
            let config = cpal::StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };
            let channel_count = config.channels as usize;
            let sample_rate = config.sample_rate.0 as usize;
            tracing::debug!("playback stream config: {:?}", &config);

            let resampler = audio::create_resampler(
                source_sample_rate,
                sample_rate as f64,
                RESAMPLE_CHUNK_SIZE,
            )?;

            let buffer = audio::shared_buffer(sample_rate * OUTPUT_LATENCY_SECONDS);
            let (producer, mut consumer) = buffer.split();

            let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channel_count) {
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            };
            let stream = output.build_output_stream(
                &config,
                output_data_fn,
                move |err| tracing::error!("output stream error: {}", err),
                None,
            )?;
            stream.play()?;
            Ok((stream, producer, resampler))
        })();

        match opened {
            Ok((stream, mut producer, mut resampler)) => {
                let _ = ready_tx.send(Ok(()));
                while let Ok(samples) = rx.recv() {
                    for chunk in audio::split_for_chunks(&samples, RESAMPLE_CHUNK_SIZE) {
                        let Ok(resampled) = resampler.process(&[chunk.as_slice()], None) else {
                            continue;
                        };
                        let Some(resampled) = resampled.first() else {
                            continue;
                        };
                        for &sample in resampled {
                            // Back off instead of dropping when the buffer is
                            // full; this thread has nothing better to do.
                            while producer.try_push(sample).is_err() {
                                std::thread::sleep(Duration::from_millis(10));
                            }
                        }
                    }
                }
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        }
    });

    ready_rx
        .recv()
        .context("playback thread exited before reporting status")??;
    Ok(PlaybackSink { tx })
}
