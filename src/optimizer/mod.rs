// Core of the closed loop: acquisition boundary, sliding window, Welch
// bandpower estimation, adaptive control, and the session that ties them
// to the audio output.
pub mod buffer;
pub mod control;
pub mod error;
pub mod session;
pub mod source;
pub mod welch;

pub use buffer::WindowBuffer;
pub use control::{
    AdaptiveController, ControlLaw, ControlLimits, ControllerState, HillClimbLaw, Proposal,
    StimulusParams,
};
pub use error::{AcquisitionError, SessionError};
pub use session::OptimizeSession;
pub use source::{Sample, ScriptedSource, SignalSource, SimulatedEeg};
pub use welch::{BandpowerEstimate, BandpowerEstimator};
