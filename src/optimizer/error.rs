use std::time::Duration;

use thiserror::Error;

use crate::audio::DeviceError;

/// Failures at the acquisition boundary.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no EEG stream found within {timeout:?}; is the headset streaming?")]
    NoStream { timeout: Duration },
    #[error("connection to the EEG stream was lost")]
    ConnectionLost,
}

/// Terminal conditions for a running optimization session.
///
/// Degenerate estimates and out-of-bounds control proposals are resolved
/// locally (0.0 estimate, clamped parameters) and never reach this type.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}
