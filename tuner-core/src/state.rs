//! # Tuning State Module
//!
//! The user-facing tuning status and its debounced transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status shown to the player for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TuningState {
    /// Nothing loud enough (or high enough) to tune against.
    #[default]
    Silent,
    /// Below the target note: tune up.
    Flat,
    /// Above the target note: tune down.
    Sharp,
    InTune,
}

impl TuningState {
    /// Instruction text for the display.
    pub fn instruction(&self) -> &'static str {
        match self {
            TuningState::Silent => " ",
            TuningState::Flat => "Tune Up",
            TuningState::Sharp => "Tune Down",
            TuningState::InTune => "In Tune",
        }
    }
}

impl fmt::Display for TuningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TuningState::Silent => "silent",
            TuningState::Flat => "flat",
            TuningState::Sharp => "sharp",
            TuningState::InTune => "in tune",
        };
        f.write_str(label)
    }
}

/// Unit for tuning error display and tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorUnit {
    #[default]
    Hz,
    Cents,
}

impl ErrorUnit {
    pub fn toggled(self) -> Self {
        match self {
            ErrorUnit::Hz => ErrorUnit::Cents,
            ErrorUnit::Cents => ErrorUnit::Hz,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            ErrorUnit::Hz => "Hz",
            ErrorUnit::Cents => "c",
        }
    }
}

/// How close to the target counts as in tune.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub value: f32,
    pub unit: ErrorUnit,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { value: 1.0, unit: ErrorUnit::Hz }
    }
}

/// Fixed thresholds driving the state decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateThresholds {
    /// Peaks at or below this level are silent (same scale as the spectrum).
    pub magnitude_threshold: f32,
    /// Peaks at or below this frequency are treated as sub-audio noise.
    pub min_freq: f32,
    pub in_tune_tolerance: Tolerance,
}

/// Decides the tuning state for one cycle.
///
/// # Arguments
/// * `peak_magnitude` - Level of the detected peak
/// * `peak_freq` - Frequency of the detected peak in Hz
/// * `error_hz` - Signed error against the closest note in Hz
/// * `error_cents` - Signed error against the closest note in cents
/// * `thresholds` - Silence gates and in-tune tolerance
pub fn evaluate(
    peak_magnitude: f32,
    peak_freq: f32,
    error_hz: f32,
    error_cents: f32,
    thresholds: &StateThresholds,
) -> TuningState {
    if !(peak_magnitude > thresholds.magnitude_threshold) || !(peak_freq > thresholds.min_freq) {
        return TuningState::Silent;
    }

    let error = match thresholds.in_tune_tolerance.unit {
        ErrorUnit::Hz => error_hz,
        ErrorUnit::Cents => error_cents,
    };

    if error.abs() < thresholds.in_tune_tolerance.value {
        TuningState::InTune
    } else if error_hz < 0.0 {
        TuningState::Flat
    } else {
        TuningState::Sharp
    }
}

/// Remembers the last state so the display is only told about changes.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    current: TuningState,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> TuningState {
        self.current
    }

    /// Records `next`, returning the previous state if it changed.
    pub fn update(&mut self, next: TuningState) -> Option<TuningState> {
        if next == self.current {
            return None;
        }
        let previous = std::mem::replace(&mut self.current, next);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> StateThresholds {
        StateThresholds {
            magnitude_threshold: -15.0,
            min_freq: 30.0,
            in_tune_tolerance: Tolerance::default(),
        }
    }

    #[test]
    fn quiet_peak_is_silent_regardless_of_frequency() {
        for &freq in &[20.0, 82.4, 110.0, 1000.0] {
            assert_eq!(evaluate(-20.0, freq, 0.0, 0.0, &thresholds()), TuningState::Silent);
        }
        assert_eq!(evaluate(-15.0, 110.0, 0.0, 0.0, &thresholds()), TuningState::Silent);
    }

    #[test]
    fn sub_audio_peak_is_silent() {
        assert_eq!(evaluate(0.0, 30.0, 0.0, 0.0, &thresholds()), TuningState::Silent);
        assert_eq!(evaluate(0.0, 12.0, -3.0, -50.0, &thresholds()), TuningState::Silent);
    }

    #[test]
    fn error_sign_decides_flat_or_sharp() {
        assert_eq!(evaluate(-5.0, 108.0, -2.0, -31.7, &thresholds()), TuningState::Flat);
        assert_eq!(evaluate(-5.0, 112.0, 2.0, 31.2, &thresholds()), TuningState::Sharp);
        assert_eq!(evaluate(-5.0, 110.5, 0.5, 7.8, &thresholds()), TuningState::InTune);
        assert_eq!(evaluate(-5.0, 111.0, 1.0, 15.7, &thresholds()), TuningState::Sharp);
    }

    #[test]
    fn cents_tolerance_uses_cents_error() {
        let mut t = thresholds();
        t.in_tune_tolerance = Tolerance { value: 10.0, unit: ErrorUnit::Cents };
        assert_eq!(evaluate(-5.0, 330.9, 1.3, 6.8, &t), TuningState::InTune);
        assert_eq!(evaluate(-5.0, 110.9, 0.9, 14.1, &t), TuningState::Sharp);
    }

    #[test]
    fn nan_magnitude_is_silent() {
        assert_eq!(evaluate(f32::NAN, 110.0, 0.0, 0.0, &thresholds()), TuningState::Silent);
    }

    #[test]
    fn tracker_reports_only_changes() {
        let mut tracker = StateTracker::new();
        assert_eq!(tracker.current(), TuningState::Silent);
        assert_eq!(tracker.update(TuningState::Silent), None);
        assert_eq!(tracker.update(TuningState::Flat), Some(TuningState::Silent));
        assert_eq!(tracker.update(TuningState::Flat), None);
        assert_eq!(tracker.update(TuningState::InTune), Some(TuningState::Flat));
        assert_eq!(tracker.current(), TuningState::InTune);
    }

    #[test]
    fn unit_toggles_back_and_forth() {
        assert_eq!(ErrorUnit::Hz.toggled(), ErrorUnit::Cents);
        assert_eq!(ErrorUnit::Hz.toggled().toggled(), ErrorUnit::Hz);
    }
}
