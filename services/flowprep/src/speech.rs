//! Plays interviewer speech through the default output device.
//!
//! A machine without a usable output device still gets a working text
//! session; the sink degrades to a no-op with a warning.

use anyhow::Result;
use flowprep_core::session::{NoPlayback, SpeechPlayback};
use flowprep_native_utils::audio;
use flowprep_native_utils::playback::{PlaybackSink, start_output};

struct SpeakerPlayback {
    sink: PlaybackSink,
}

impl SpeechPlayback for SpeakerPlayback {
    fn play(&mut self, audio_b64: &str) -> Result<()> {
        let samples = audio::decode(audio_b64);
        if !samples.is_empty() {
            self.sink.enqueue(samples);
        }
        Ok(())
    }
}

pub fn open() -> Box<dyn SpeechPlayback> {
    match start_output(None, audio::SPEECH_PCM16_SAMPLE_RATE) {
        Ok(sink) => Box::new(SpeakerPlayback { sink }),
        Err(e) => {
            tracing::warn!("no audio output available, interviewer speech disabled: {e:#}");
            Box::new(NoPlayback)
        }
    }
}
