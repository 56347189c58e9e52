//! EEG-driven binaural beat neurofeedback loop.
//!
//! Live samples flow through a sliding [`optimizer::WindowBuffer`], a Welch
//! [`optimizer::BandpowerEstimator`] scores the target band each decision
//! window, and an [`optimizer::AdaptiveController`] steers the binaural
//! stimulus rendered by [`audio::BeatsRenderer`].

pub mod audio;
pub mod config;
pub mod optimizer;
