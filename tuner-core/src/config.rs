//! # Configuration Module
//!
//! Every tunable of the analysis pipeline, with defaults matching the
//! serial tuner hardware (20 kHz sampling, 32768-point window, -15 dB gate).
//! A configuration can be loaded from a JSON file; all fields are optional
//! and unknown fields are rejected.

use crate::error::{Result, TunerError};
use crate::fft::{SpectrumScale, DEFAULT_DB_FLOOR};
use crate::state::{ErrorUnit, StateThresholds, Tolerance};
use crate::tuning::{Tuning, TuningLibrary};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest window the analyzer accepts.
pub const MIN_WINDOW_SIZE: usize = 16;

/// Reads per window at the default chunk size, roughly 30 fps at 20 kHz.
const READS_PER_WINDOW: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TunerConfig {
    /// FFT window size N, also the sample buffer capacity.
    pub window_size: usize,
    /// Nominal sample rate of the source in Hz.
    pub sample_rate: u32,
    /// Bytes requested per cycle. Defaults to `window_size / 60`.
    pub chunk_size: Option<usize>,
    /// Detection threshold, in the units of `scale`.
    pub threshold: f32,
    pub scale: SpectrumScale,
    /// Lower clamp for decibel spectra.
    pub db_floor: f32,
    /// Apply a Hann window before the transform.
    pub apply_window: bool,
    /// Scale DC-free samples into [-1, 1].
    pub normalize: bool,
    /// Peaks at or below this frequency read as silent.
    pub min_freq: f32,
    /// Frequency gate applied during the peak search itself. Zero disables it.
    pub peak_min_frequency: f32,
    pub interpolate_peak: bool,
    pub in_tune_tolerance: Tolerance,
    pub error_unit: ErrorUnit,
    /// Name of the active tuning at startup.
    pub tuning: String,
    pub custom_tunings: Vec<Tuning>,
    /// Upper bound on how long one cycle waits for serial bytes.
    pub read_timeout_ms: u64,
    /// Delay between the end of one cycle and the start of the next.
    pub cycle_period_ms: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_size: 32768,
            sample_rate: 20000,
            chunk_size: None,
            threshold: -15.0,
            scale: SpectrumScale::Decibels,
            db_floor: DEFAULT_DB_FLOOR,
            apply_window: true,
            normalize: true,
            min_freq: 30.0,
            peak_min_frequency: 0.0,
            interpolate_peak: false,
            in_tune_tolerance: Tolerance::default(),
            error_unit: ErrorUnit::Hz,
            tuning: "Standard".to_string(),
            custom_tunings: Vec::new(),
            read_timeout_ms: 20,
            cycle_period_ms: 5,
        }
    }
}

impl TunerConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// * `Io` - the file cannot be read
    /// * `Json` - the file is not a valid configuration document
    /// * `Configuration` - the values are inconsistent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: TunerConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(TunerError::config(format!(
                "window_size must be at least {MIN_WINDOW_SIZE}, got {}",
                self.window_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(TunerError::config("sample_rate must be positive"));
        }
        if self.chunk_size == Some(0) {
            return Err(TunerError::config("chunk_size must be positive"));
        }
        if !self.threshold.is_finite() || !self.db_floor.is_finite() {
            return Err(TunerError::config("threshold and db_floor must be finite"));
        }
        if !(self.min_freq.is_finite() && self.min_freq >= 0.0)
            || !(self.peak_min_frequency.is_finite() && self.peak_min_frequency >= 0.0)
        {
            return Err(TunerError::config("frequency gates must be non-negative"));
        }
        let tolerance = self.in_tune_tolerance.value;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(TunerError::config(format!(
                "in_tune_tolerance must be positive, got {tolerance}"
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(TunerError::config("read_timeout_ms must be positive"));
        }
        let library = self.library()?;
        if library.find(&self.tuning).is_none() {
            return Err(TunerError::config(format!("unknown tuning '{}'", self.tuning)));
        }
        Ok(())
    }

    /// Built-in tunings plus the configured custom ones.
    pub fn library(&self) -> Result<TuningLibrary> {
        TuningLibrary::with_custom(self.custom_tunings.clone())
    }

    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size
            .unwrap_or(self.window_size / READS_PER_WINDOW)
            .max(1)
    }

    pub fn thresholds(&self) -> StateThresholds {
        StateThresholds {
            magnitude_threshold: self.threshold,
            min_freq: self.min_freq,
            in_tune_tolerance: self.in_tune_tolerance,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TunerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.effective_chunk_size(), 32768 / 60);
        assert_eq!(config.thresholds().magnitude_threshold, -15.0);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = TunerConfig::from_json_str(
            r#"{ "window_size": 1024, "sample_rate": 8000, "scale": "power", "threshold": 10.0,
                 "in_tune_tolerance": { "value": 5.0, "unit": "cents" }, "tuning": "drop d" }"#,
        )
        .unwrap();
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.scale, SpectrumScale::Power);
        assert_eq!(config.in_tune_tolerance.unit, ErrorUnit::Cents);
        assert!(config.apply_window);
        assert_eq!(config.read_timeout_ms, 20);
    }

    #[test]
    fn custom_tuning_can_be_selected() {
        let config = TunerConfig::from_json_str(
            r#"{ "tuning": "Bass", "custom_tunings": [
                   { "name": "Bass", "notes": [
                       { "name": "E1", "frequency": 41.2 },
                       { "name": "A1", "frequency": 55.0 } ] } ] }"#,
        )
        .unwrap();
        let library = config.library().unwrap();
        assert_eq!(library.find(&config.tuning).unwrap().notes.len(), 2);
    }

    #[test]
    fn bundled_example_config_loads() {
        let config = TunerConfig::from_json_str(include_str!("../../tuner.example.json")).unwrap();
        let library = config.library().unwrap();
        assert_eq!(library.find("bass standard").unwrap().notes[0].name, "E1");
        assert_eq!(config, TunerConfig { custom_tunings: config.custom_tunings.clone(), ..TunerConfig::default() });
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            r#"{ "window_size": 4 }"#,
            r#"{ "sample_rate": 0 }"#,
            r#"{ "chunk_size": 0 }"#,
            r#"{ "in_tune_tolerance": { "value": 0.0, "unit": "hz" } }"#,
            r#"{ "tuning": "nonexistent" }"#,
            r#"{ "custom_tunings": [ { "name": "Bad", "notes": [ { "name": "X", "frequency": -1.0 } ] } ] }"#,
            r#"{ "custom_tunings": [ { "name": "Hollow", "notes": [] } ] }"#,
            r#"{ "min_freq": -3.0 }"#,
            r#"{ "read_timeout_ms": 0 }"#,
        ];
        for case in cases {
            assert!(
                matches!(TunerConfig::from_json_str(case), Err(TunerError::Configuration(_))),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(TunerConfig::from_json_str("{ window_size"), Err(TunerError::Json(_))));
        assert!(matches!(
            TunerConfig::from_json_str(r#"{ "window": 1024 }"#),
            Err(TunerError::Json(_))
        ));
    }
}
