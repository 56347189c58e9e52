use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::Rng;

use crate::optimizer::error::AcquisitionError;

/// One timestamped multi-channel EEG reading.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Seconds since the stream started. Monotonically non-decreasing, but
    /// jitter and gaps are expected.
    pub timestamp: f64,
    pub channels: Vec<f32>,
}

/// Something that can yield EEG samples on demand.
///
/// `pull` blocks up to the source's own poll timeout; `Ok(None)` means no
/// sample arrived in time and is distinct from a dead stream, which is
/// `Err(AcquisitionError::ConnectionLost)`.
pub trait SignalSource {
    fn pull(&mut self) -> Result<Option<Sample>, AcquisitionError>;

    /// Releases the underlying connection. Idempotent.
    fn disconnect(&mut self);
}

/// Built-in source for sessions without hardware: a tone in the alpha band
/// riding on a noise floor, paced in real time at the configured rate.
pub struct SimulatedEeg {
    fs: f32,
    tone_hz: f32,
    started: Instant,
    produced: u64,
    connected: bool,
}

impl SimulatedEeg {
    pub const CHANNELS: usize = 4;
    const TONE_AMPLITUDE: f32 = 20.0; // uV
    const NOISE_AMPLITUDE: f32 = 4.0;

    /// Mirrors the hardware connect contract; the simulated stream always
    /// resolves. `fs` must be positive (enforced by config validation).
    pub fn connect(timeout: Duration, fs: f32) -> Result<Self, AcquisitionError> {
        info!("resolving EEG stream (timeout {timeout:?})...");
        info!("connected to simulated EEG stream at {fs} Hz");
        Ok(Self {
            fs: fs.max(1.0),
            tone_hz: 10.0,
            started: Instant::now(),
            produced: 0,
            connected: true,
        })
    }

    pub fn with_tone_hz(mut self, tone_hz: f32) -> Self {
        self.tone_hz = tone_hz;
        self
    }
}

impl SignalSource for SimulatedEeg {
    fn pull(&mut self) -> Result<Option<Sample>, AcquisitionError> {
        if !self.connected {
            return Err(AcquisitionError::ConnectionLost);
        }
        // Pace delivery so the stream runs at fs in wall-clock time.
        let due = self.started + Duration::from_secs_f64(self.produced as f64 / self.fs as f64);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        let t = self.produced as f64 / self.fs as f64;
        let tone =
            Self::TONE_AMPLITUDE * (std::f64::consts::TAU * self.tone_hz as f64 * t).sin() as f32;
        let mut rng = rand::thread_rng();
        let channels = (0..Self::CHANNELS)
            .map(|_| tone + rng.gen_range(-Self::NOISE_AMPLITUDE..Self::NOISE_AMPLITUDE))
            .collect();
        self.produced += 1;
        Ok(Some(Sample {
            timestamp: t,
            channels,
        }))
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            debug!("simulated EEG stream disconnected");
        }
    }
}

/// Deterministic source fed from a prepared sample list, for tests and
/// offline playback.
pub struct ScriptedSource {
    queue: VecDeque<Sample>,
    pull_delay: Option<Duration>,
    idle_when_exhausted: bool,
    disconnects: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// A source that yields the given samples in order and then reports the
    /// connection as lost.
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            pull_delay: None,
            idle_when_exhausted: false,
            disconnects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds a single-channel script from a raw trace sampled at `fs`.
    pub fn from_trace(fs: f32, values: impl IntoIterator<Item = f32>) -> Self {
        let samples = values.into_iter().enumerate().map(|(i, v)| Sample {
            timestamp: i as f64 / fs as f64,
            channels: vec![v],
        });
        Self::new(samples.collect::<Vec<_>>())
    }

    /// After the script runs out, report "no sample yet" instead of a lost
    /// connection.
    pub fn idle_when_exhausted(mut self) -> Self {
        self.idle_when_exhausted = true;
        self
    }

    /// Sleep this long on every pull, pacing the script in wall-clock time.
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = Some(delay);
        self
    }

    /// Shared counter of `disconnect` calls, for assertions after the
    /// session has consumed the source.
    pub fn disconnect_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.disconnects)
    }
}

impl SignalSource for ScriptedSource {
    fn pull(&mut self) -> Result<Option<Sample>, AcquisitionError> {
        if let Some(delay) = self.pull_delay {
            thread::sleep(delay);
        }
        match self.queue.pop_front() {
            Some(sample) => Ok(Some(sample)),
            None if self.idle_when_exhausted => {
                if self.pull_delay.is_none() {
                    // Keep an exhausted idle source from busy-spinning.
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(None)
            }
            None => Err(AcquisitionError::ConnectionLost),
        }
    }

    fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
