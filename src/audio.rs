use std::f32::consts::TAU;

use log::debug;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use crate::optimizer::control::StimulusParams;

/// Headroom so the rendered tones never reach device full scale.
const AMPLITUDE: f32 = 0.8;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open the audio output device: {0}")]
    Open(#[from] rodio::StreamError),
    #[error("failed to start audio playback: {0}")]
    Playback(#[from] rodio::PlayError),
}

/// Synthesizes `floor(rate * duration)` interleaved stereo frames for a
/// binaural beat: left at `carrier - split/2`, right at `carrier + split/2`.
pub fn synthesize(params: StimulusParams, duration_secs: f32, rate: u32) -> Vec<f32> {
    let frames = (rate as f32 * duration_secs).floor() as usize;
    let left_hz = params.left_hz();
    let right_hz = params.right_hz();
    let mut pcm = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / rate as f32;
        pcm.push(AMPLITUDE * (TAU * left_hz * t).sin());
        pcm.push(AMPLITUDE * (TAU * right_hz * t).sin());
    }
    pcm
}

/// Destination for rendered stimuli. `play` may block until the device
/// accepts the buffer but must not block until playback finishes; `close`
/// is idempotent and releases the device.
pub trait StimulusOutput {
    fn play(&mut self, params: StimulusParams, duration_secs: f32) -> Result<(), DeviceError>;
    fn close(&mut self);
}

/// Binaural beat renderer backed by the default rodio output device.
pub struct BeatsRenderer {
    // The stream must stay alive for the sink's queue to keep playing.
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
    rate: u32,
    chunk_frames: usize,
    released: bool,
}

impl BeatsRenderer {
    pub fn open(rate: u32, chunk_frames: usize) -> Result<Self, DeviceError> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        debug!("audio output open at {rate} Hz, chunk {chunk_frames} frames");
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
            rate,
            chunk_frames: chunk_frames.max(1),
            released: false,
        })
    }

    /// Blocks until everything queued so far has played out. Used by the
    /// fixed-beats mode; the adaptive loop never waits on playback.
    pub fn wait_until_done(&self) {
        self.sink.sleep_until_end();
    }
}

impl StimulusOutput for BeatsRenderer {
    fn play(&mut self, params: StimulusParams, duration_secs: f32) -> Result<(), DeviceError> {
        let pcm = synthesize(params, duration_secs, self.rate);
        // Submit in chunk-sized slices; the sink queues them and playback
        // proceeds asynchronously.
        for chunk in pcm.chunks(self.chunk_frames * 2) {
            self.sink
                .append(SamplesBuffer::new(2, self.rate, chunk.to_vec()));
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.released {
            self.sink.stop();
            self.released = true;
            debug!("audio output released");
        }
    }
}

impl Drop for BeatsRenderer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(carrier_hz: f32, split_hz: f32) -> StimulusParams {
        StimulusParams {
            carrier_hz,
            split_hz,
        }
    }

    #[test]
    fn one_second_yields_exactly_rate_frames() {
        let pcm = synthesize(params(100.0, 10.0), 1.0, 44_100);
        assert_eq!(pcm.len(), 2 * 44_100);
        assert_eq!(pcm[0], 0.0); // left[0] = sin(0)
        assert_eq!(pcm[1], 0.0); // right[0] = sin(0)
    }

    #[test]
    fn frame_count_is_independent_of_prior_calls() {
        let first = synthesize(params(100.0, 10.0), 1.0, 44_100);
        let _ = synthesize(params(300.0, 4.0), 0.25, 44_100);
        let again = synthesize(params(100.0, 10.0), 1.0, 44_100);
        assert_eq!(first.len(), again.len());
        assert_eq!(first, again);
    }

    #[test]
    fn output_never_clips() {
        let pcm = synthesize(params(440.0, 30.0), 0.5, 48_000);
        assert!(pcm.iter().all(|s| s.abs() < 1.0));
    }

    #[test]
    fn channels_interleave_left_then_right() {
        // With split = 2*carrier the left tone is at 0 Hz, so every left
        // sample is exactly zero while the right channel oscillates.
        let pcm = synthesize(params(10.0, 20.0), 0.1, 8_000);
        assert!(pcm.iter().step_by(2).all(|&l| l == 0.0));
        assert!(pcm.iter().skip(1).step_by(2).any(|&r| r != 0.0));
    }

    #[test]
    fn duration_is_floored_to_whole_frames() {
        let pcm = synthesize(params(100.0, 10.0), 0.5, 101);
        assert_eq!(pcm.len(), 2 * 50);
    }
}
