use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::audio::StimulusOutput;
use crate::optimizer::buffer::WindowBuffer;
use crate::optimizer::control::AdaptiveController;
use crate::optimizer::error::SessionError;
use crate::optimizer::source::SignalSource;
use crate::optimizer::welch::BandpowerEstimator;

/// The closed neurofeedback loop: pull samples into the sliding window and,
/// every `window` seconds of wall-clock time, estimate bandpower, let the
/// controller pick the next stimulus, and hand it to the output.
///
/// Runs on a single thread; the buffer and controller state are owned here
/// and never shared. `run` releases the source and the output on every exit
/// path — clean cancellation, lost connection, or device failure.
pub struct OptimizeSession<S: SignalSource, O: StimulusOutput> {
    source: S,
    output: O,
    controller: AdaptiveController,
    estimator: BandpowerEstimator,
    buffer: WindowBuffer,
    window: Duration,
    stimulus: Duration,
    cancel: Arc<AtomicBool>,
    decisions: u64,
}

impl<S: SignalSource, O: StimulusOutput> OptimizeSession<S, O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: S,
        output: O,
        controller: AdaptiveController,
        estimator: BandpowerEstimator,
        fs: f32,
        window: Duration,
        stimulus: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let buffer = WindowBuffer::for_window(fs, window.as_secs_f32());
        Self {
            source,
            output,
            controller,
            estimator,
            buffer,
            window,
            stimulus,
            cancel,
            decisions: 0,
        }
    }

    /// Runs until cancelled (`Ok(())`) or a terminal failure. A lost
    /// connection is terminal for the session — no silent retry, since that
    /// could mask unbounded gaps in the signal.
    pub fn run(mut self) -> Result<(), SessionError> {
        info!(
            "optimization loop started: window {:?}, band {:?} Hz, \
             initial carrier {:.1} Hz / split {:.1} Hz",
            self.window,
            self.estimator.band(),
            self.controller.params().carrier_hz,
            self.controller.params().split_hz,
        );
        let result = self.run_loop();
        self.output.close();
        self.source.disconnect();
        match &result {
            Ok(()) => info!("optimization stopped by user after {} decisions", self.decisions),
            Err(e) => debug!("optimization loop terminated: {e}"),
        }
        result
    }

    fn run_loop(&mut self) -> Result<(), SessionError> {
        let mut window_started = Instant::now();
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            match self.source.pull()? {
                Some(sample) => {
                    // First EEG channel drives the feedback.
                    if let Some(&value) = sample.channels.first() {
                        self.buffer.push(value);
                    }
                }
                None => {
                    // No sample within the source's poll timeout; the window
                    // timer keeps running regardless.
                }
            }
            if window_started.elapsed() >= self.window {
                self.decide()?;
                window_started = Instant::now();
            }
        }
    }

    fn decide(&mut self) -> Result<(), SessionError> {
        let estimate = self.estimator.estimate(&self.buffer.snapshot());
        let params = self.controller.decide(estimate.power);
        self.decisions += 1;
        info!(
            "bandpower {:.4} over {} samples -> carrier {:.1} Hz, split {:.1} Hz",
            estimate.power, estimate.samples_used, params.carrier_hz, params.split_hz,
        );
        self.output.play(params, self.stimulus.as_secs_f32())?;
        Ok(())
    }
}
