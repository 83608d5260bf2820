// tuner-core/src/lib.rs

//! The core logic for the serial guitar tuner.
//! This crate is responsible for sample ingestion, spectral analysis,
//! fundamental detection and note matching. It is completely headless
//! and contains no display code: every analysis cycle produces a plain
//! [`AnalysisFrame`] for whatever front end is attached.

pub mod buffer;
pub mod config;
pub mod driver;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod preprocess;
pub mod session;
pub mod source;
pub mod state;
pub mod tuning;

pub use error::{Result, TunerError};

use pitch::PeakResult;
use state::{ErrorUnit, TuningState};

/// The tuning verdict for one analysis cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningReading {
    /// Name of the closest note in the active tuning.
    pub closest_note: String,
    /// Target frequency of that note in Hz.
    pub target_freq: f32,
    /// Signed error in Hz (negative = flat).
    pub error_hz: f32,
    /// Signed error in cents (negative = flat).
    pub error_cents: f32,
    pub state: TuningState,
}

impl TuningReading {
    /// The error in the requested display unit.
    pub fn error_in(&self, unit: ErrorUnit) -> f32 {
        match unit {
            ErrorUnit::Hz => self.error_hz,
            ErrorUnit::Cents => self.error_cents,
        }
    }
}

/// Represents the result of a single analysis cycle, handed to the display.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    /// DC-free samples of the current window (before the Hann taper).
    pub waveform: Vec<f32>,
    /// Spectrum in ascending frequency order, centred on 0 Hz.
    pub spectrum: Vec<f32>,
    /// Frequency axis aligned with `spectrum`.
    pub frequencies: Vec<f32>,
    pub peak: PeakResult,
    pub reading: TuningReading,
    /// Set to the previous state when this cycle changed the tuning state.
    pub previous_state: Option<TuningState>,
    pub tuning_name: String,
    pub error_unit: ErrorUnit,
    /// Cycles per second measured since the previous cycle.
    pub cycle_rate: Option<f32>,
    pub paused: bool,
}

impl AnalysisFrame {
    pub fn state_changed(&self) -> bool {
        self.previous_state.is_some()
    }
}
