use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio;
use crate::capture::{CaptureHandle, CaptureSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
    Stopped,
}

/// Finished capture, encoded as a playable WAV file.
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
}

struct ActiveCapture {
    handle: CaptureHandle,
    chunk_rx: mpsc::UnboundedReceiver<Vec<f32>>,
    ticker: tokio::task::JoinHandle<()>,
}

/// Recorder state machine: idle -> recording -> stopped, with `reset`
/// returning to idle from anywhere.
///
/// Owns the device stream exclusively between `start` and `stop`/`reset`.
/// Produces its artifact independently of any network state; the duration
/// counter ticks once per second while recording.
pub struct Recorder<S: CaptureSource> {
    source: S,
    status: RecorderStatus,
    duration: Arc<AtomicU64>,
    error: Option<String>,
    artifact: Option<RecordingArtifact>,
    active: Option<ActiveCapture>,
}

impl<S: CaptureSource> Recorder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            status: RecorderStatus::Idle,
            duration: Arc::new(AtomicU64::new(0)),
            error: None,
            artifact: None,
            active: None,
        }
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn artifact(&self) -> Option<&RecordingArtifact> {
        self.artifact.as_ref()
    }

    /// Hands the artifact off to the submission path; the recorder does not
    /// retain it once submitted.
    pub fn take_artifact(&mut self) -> Option<RecordingArtifact> {
        self.artifact.take()
    }

    /// Requests the device and begins capturing. A start while already
    /// recording is a no-op; a device failure leaves the recorder idle with
    /// an error instead of recording.
    pub fn start(&mut self) {
        if self.status == RecorderStatus::Recording {
            return;
        }
        self.error = None;
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        match self.source.open(chunk_tx) {
            Err(e) => {
                tracing::warn!("microphone unavailable: {e:#}");
                self.error = Some(format!("Microphone access failed: {e}"));
                self.status = RecorderStatus::Idle;
            }
            Ok(handle) => {
                self.duration.store(0, Ordering::SeqCst);
                let duration = self.duration.clone();
                let ticker = tokio::spawn(async move {
                    let mut tick = tokio::time::interval(Duration::from_secs(1));
                    // The first tick completes immediately; skip it so the
                    // counter starts at zero.
                    tick.tick().await;
                    loop {
                        tick.tick().await;
                        duration.fetch_add(1, Ordering::SeqCst);
                    }
                });
                self.artifact = None;
                self.active = Some(ActiveCapture {
                    handle,
                    chunk_rx,
                    ticker,
                });
                self.status = RecorderStatus::Recording;
            }
        }
    }

    /// Finalizes the capture: releases the device, drains buffered chunks,
    /// and encodes the artifact. A stop with zero buffered chunks still
    /// yields a valid empty artifact.
    pub fn stop(&mut self) {
        if self.status != RecorderStatus::Recording {
            return;
        }
        if let Some(mut active) = self.active.take() {
            active.ticker.abort();
            active.handle.release();
            let mut samples = Vec::new();
            while let Ok(chunk) = active.chunk_rx.try_recv() {
                samples.extend(chunk);
            }
            let sample_rate = self.source.sample_rate();
            let wav = audio::encode_wav(&samples, sample_rate).unwrap_or_else(|e| {
                tracing::error!("failed to encode artifact: {e:#}");
                Vec::new()
            });
            self.artifact = Some(RecordingArtifact { wav, sample_rate });
            self.status = RecorderStatus::Stopped;
        }
    }

    /// Discards everything and returns to idle. Safe from any state,
    /// including mid-recording (implicit stop-and-discard).
    pub fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            active.ticker.abort();
            active.handle.release();
        }
        self.status = RecorderStatus::Idle;
        self.duration.store(0, Ordering::SeqCst);
        self.artifact = None;
        self.error = None;
    }
}

impl<S: CaptureSource> Drop for Recorder<S> {
    fn drop(&mut self) {
        // The ticker must not outlive the recorder even if stop/reset was
        // never called.
        if let Some(active) = self.active.take() {
            active.ticker.abort();
            active.handle.release();
        }
    }
}
