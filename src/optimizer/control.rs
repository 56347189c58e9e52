use log::{debug, warn};

/// Binaural stimulus parameters: carrier is the mean tone frequency, split
/// is the inter-ear difference producing the perceived beat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StimulusParams {
    pub carrier_hz: f32,
    pub split_hz: f32,
}

impl StimulusParams {
    pub fn left_hz(&self) -> f32 {
        self.carrier_hz - self.split_hz / 2.0
    }

    pub fn right_hz(&self) -> f32 {
        self.carrier_hz + self.split_hz / 2.0
    }
}

/// Safe envelope for the stimulus: hard bounds per parameter plus a
/// per-decision rate limit.
#[derive(Clone, Copy, Debug)]
pub struct ControlLimits {
    pub carrier_hz: (f32, f32),
    pub split_hz: (f32, f32),
    pub max_step_hz: f32,
}

impl Default for ControlLimits {
    fn default() -> Self {
        Self {
            carrier_hz: (80.0, 600.0),
            split_hz: (0.0, 40.0),
            max_step_hz: 2.0,
        }
    }
}

/// Everything a control law may depend on besides the fresh estimate.
/// Owned by the controller, persists across decisions, reset on restart.
#[derive(Clone, Copy, Debug)]
pub struct ControllerState {
    pub params: StimulusParams,
    /// EWMA of past bandpower estimates.
    pub smoothed_power: Option<f32>,
    pub last_power: Option<f32>,
    /// Current search direction for laws that walk a parameter (+1 or -1).
    pub direction: f32,
}

/// A control law's answer: the raw parameter proposal plus the search
/// direction to carry into the next decision.
#[derive(Clone, Copy, Debug)]
pub struct Proposal {
    pub params: StimulusParams,
    pub direction: f32,
}

/// Maps the newest bandpower estimate and the controller state to the next
/// stimulus proposal. Must be a pure function of its inputs; the controller
/// clamps the proposal into the safe envelope afterwards, so a law never
/// needs to bounds-check itself.
pub trait ControlLaw {
    fn propose(&self, power: f32, state: &ControllerState) -> Proposal;
}

/// 1-D hill climb on the split frequency: keep stepping in the current
/// direction while the smoothed bandpower improves, reverse on regression.
/// The carrier is held fixed by this law.
pub struct HillClimbLaw {
    pub step_hz: f32,
}

impl Default for HillClimbLaw {
    fn default() -> Self {
        Self { step_hz: 1.0 }
    }
}

impl ControlLaw for HillClimbLaw {
    fn propose(&self, power: f32, state: &ControllerState) -> Proposal {
        let direction = match state.smoothed_power {
            Some(previous) if power < previous => -state.direction,
            _ => state.direction,
        };
        Proposal {
            params: StimulusParams {
                carrier_hz: state.params.carrier_hz,
                split_hz: state.params.split_hz + direction * self.step_hz,
            },
            direction,
        }
    }
}

/// Wraps a pluggable control law with the enforcement the stimulus needs:
/// per-decision rate limiting, hard bounds, and the audibility floor
/// (`carrier - split/2` must stay positive). Out-of-envelope proposals are
/// clamped, never treated as errors.
pub struct AdaptiveController {
    law: Box<dyn ControlLaw + Send>,
    limits: ControlLimits,
    smoothing: f32,
    state: ControllerState,
}

/// Lowest tone either ear may be asked to render.
const MIN_TONE_HZ: f32 = 0.5;

impl AdaptiveController {
    pub fn new(
        initial: StimulusParams,
        limits: ControlLimits,
        smoothing: f32,
        law: Box<dyn ControlLaw + Send>,
    ) -> Self {
        let initial = clamp_bounds(initial, &limits);
        Self {
            law,
            limits,
            smoothing: smoothing.clamp(0.0, 1.0),
            state: ControllerState {
                params: initial,
                smoothed_power: None,
                last_power: None,
                direction: 1.0,
            },
        }
    }

    pub fn params(&self) -> StimulusParams {
        self.state.params
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Forget accumulated history, e.g. when a new session starts.
    pub fn reset(&mut self, initial: StimulusParams) {
        self.state = ControllerState {
            params: clamp_bounds(initial, &self.limits),
            smoothed_power: None,
            last_power: None,
            direction: 1.0,
        };
    }

    /// One Deciding step: ask the law for a proposal, clamp it into the
    /// safe envelope, fold the estimate into the smoothed history. A
    /// non-finite estimate holds the previous parameters instead.
    pub fn decide(&mut self, power: f32) -> StimulusParams {
        if !power.is_finite() {
            warn!("non-finite bandpower estimate; holding previous stimulus parameters");
            return self.state.params;
        }
        let proposal = self.law.propose(power, &self.state);
        let params = self.enforce(proposal.params);
        if params != proposal.params {
            debug!(
                "clamped control proposal ({:.2}/{:.2} Hz -> {:.2}/{:.2} Hz)",
                proposal.params.carrier_hz,
                proposal.params.split_hz,
                params.carrier_hz,
                params.split_hz
            );
        }
        self.state.direction = proposal.direction;
        self.state.smoothed_power = Some(match self.state.smoothed_power {
            Some(smoothed) => smoothed + self.smoothing * (power - smoothed),
            None => power,
        });
        self.state.last_power = Some(power);
        self.state.params = params;
        params
    }

    fn enforce(&self, proposed: StimulusParams) -> StimulusParams {
        let previous = self.state.params;
        let step = self.limits.max_step_hz;
        let rate_limited = StimulusParams {
            carrier_hz: previous.carrier_hz
                + (proposed.carrier_hz - previous.carrier_hz).clamp(-step, step),
            split_hz: previous.split_hz + (proposed.split_hz - previous.split_hz).clamp(-step, step),
        };
        clamp_bounds(rate_limited, &self.limits)
    }
}

fn clamp_bounds(params: StimulusParams, limits: &ControlLimits) -> StimulusParams {
    let carrier_hz = params
        .carrier_hz
        .clamp(limits.carrier_hz.0, limits.carrier_hz.1);
    let mut split_hz = params.split_hz.clamp(limits.split_hz.0, limits.split_hz.1);
    // Keep the lower tone audible: carrier - split/2 >= MIN_TONE_HZ.
    let max_split = 2.0 * (carrier_hz - MIN_TONE_HZ);
    if split_hz > max_split {
        split_hz = max_split.max(0.0);
    }
    StimulusParams {
        carrier_hz,
        split_hz,
    }
}
