use std::sync::mpsc as std_mpsc;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc::UnboundedSender;

use crate::device;

/// Frames per cpal input buffer; small enough that a stop right after a
/// start still finds buffered audio.
pub const CAPTURE_CHUNK_SIZE: usize = 1024;

/// Seam between the recorder state machine and the host audio stack.
/// The real implementation drives cpal; tests substitute a mock.
#[cfg_attr(test, automock)]
pub trait CaptureSource: Send {
    /// Opens the input device and delivers mono f32 chunks into `chunks`
    /// until the returned handle is released.
    fn open(&mut self, chunks: UnboundedSender<Vec<f32>>) -> Result<CaptureHandle>;

    /// Sample rate of the most recently opened stream.
    fn sample_rate(&self) -> u32;
}

/// Keeps the device stream alive. Releasing (or dropping) the handle stops
/// capture and gives the device back.
pub struct CaptureHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CaptureHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release()
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release()
        }
    }
}

pub struct CpalCaptureSource {
    device_name: Option<String>,
    sample_rate: u32,
}

impl CpalCaptureSource {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            sample_rate: 0,
        }
    }
}

impl CaptureSource for CpalCaptureSource {
    fn open(&mut self, chunks: UnboundedSender<Vec<f32>>) -> Result<CaptureHandle> {
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        // cpal streams are !Send, so the stream lives on a dedicated thread
        // for the whole capture and is dropped there on release.
        std::thread::spawn(move || {
            let opened = (|| -> Result<(cpal::Stream, u32)> {
                let input = device::get_or_default_input(device_name)?;
                let default_config = input
                    .default_input_config()
                    .context("no default input config")?;
                let config = StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: default_config.sample_rate(),
                    buffer_size: cpal::BufferSize::Fixed(FrameCount::from(
                        CAPTURE_CHUNK_SIZE as u32,
                    )),
                };
                let channel_count = config.channels as usize;
                let sample_rate = config.sample_rate.0;
                tracing::debug!("capture stream config: {:?}", &config);

                let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let audio = if channel_count > 1 {
                        data.chunks(channel_count)
                            .map(|c| c.iter().sum::<f32>() / channel_count as f32)
                            .collect::<Vec<f32>>()
                    } else {
                        data.to_vec()
                    };
                    if chunks.send(audio).is_err() {
                        tracing::debug!("capture sink gone, dropping chunk");
                    }
                };
                let stream = input.build_input_stream(
                    &config,
                    input_data_fn,
                    move |err| tracing::error!("input stream error: {}", err),
                    None,
                )?;
                stream.play()?;
                Ok((stream, sample_rate))
            })();

            match opened {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Park until released. Dropping the stream stops capture.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let sample_rate = ready_rx
            .recv()
            .context("capture thread exited before reporting status")??;
        self.sample_rate = sample_rate;
        Ok(CaptureHandle::new(move || {
            let _ = stop_tx.send(());
        }))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
