//! # Tuner Session Module
//!
//! The context object owned by the driver loop. It holds everything that
//! persists between cycles (the sample buffer, the active tuning, the last
//! tuning state, user toggles) and runs the analysis pipeline once per cycle:
//!
//! samples → buffer → preprocess → FFT → peak → note match → state

use crate::buffer::SampleBuffer;
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::{self, SpectralAnalyzer};
use crate::pitch::{PeakDetector, PeakResult};
use crate::preprocess::Preprocessor;
use crate::source::EffectCommand;
use crate::state::{self, ErrorUnit, StateThresholds, StateTracker};
use crate::tuning::{self, Tuning, TuningLibrary};
use crate::{AnalysisFrame, TuningReading};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct TunerSession {
    buffer: SampleBuffer,
    preprocessor: Preprocessor,
    analyzer: SpectralAnalyzer,
    detector: PeakDetector,
    threshold: f32,
    thresholds: StateThresholds,
    library: TuningLibrary,
    active_tuning: Arc<Tuning>,
    tracker: StateTracker,
    error_unit: ErrorUnit,
    paused: bool,
    effect_enabled: bool,
    last_cycle: Option<Instant>,
}

impl TunerSession {
    /// Builds a session from a configuration, validating it first.
    ///
    /// # Errors
    /// * `Configuration` - invalid settings or unknown tuning
    pub fn new(config: &TunerConfig) -> Result<Self> {
        config.validate()?;
        let library = config.library()?;
        let active_tuning = library
            .find(&config.tuning)
            .cloned()
            .ok_or_else(|| TunerError::Configuration(format!("unknown tuning '{}'", config.tuning)))?;

        let mut detector = PeakDetector::new(config.scale);
        detector.min_frequency = config.peak_min_frequency;
        detector.interpolate = config.interpolate_peak;

        info!(
            window_size = config.window_size,
            sample_rate = config.sample_rate,
            scale = ?config.scale,
            tuning = %active_tuning.name,
            "tuner session ready"
        );

        Ok(Self {
            buffer: SampleBuffer::new(config.window_size),
            preprocessor: Preprocessor::new(config.window_size, config.apply_window, config.normalize),
            analyzer: SpectralAnalyzer::new(
                config.window_size,
                config.sample_rate,
                config.scale,
                config.db_floor,
            ),
            detector,
            threshold: config.threshold,
            thresholds: config.thresholds(),
            library,
            active_tuning: Arc::new(active_tuning),
            tracker: StateTracker::new(),
            error_unit: config.error_unit,
            paused: false,
            effect_enabled: false,
            last_cycle: None,
        })
    }

    /// Runs one full analysis cycle after appending `new_samples`.
    ///
    /// An empty `new_samples` simply re-analyses the current window.
    pub fn run_cycle(&mut self, new_samples: &[u8]) -> AnalysisFrame {
        self.buffer.push(new_samples);
        let window = self.buffer.snapshot();

        let waveform = self.preprocessor.remove_dc(&window);
        let mut signal = waveform.clone();
        self.preprocessor.apply_window(&mut signal);

        let spectrum = self.analyzer.transform(&signal);
        let peak = self
            .detector
            .find_fundamental(&spectrum.values, &spectrum.frequencies, self.threshold)
            .unwrap_or(PeakResult {
                frequency: 0.0,
                magnitude: f32::NEG_INFINITY,
                bin: 0,
                above_threshold: false,
            });

        let tuning = Arc::clone(&self.active_tuning);
        let reading = match tuning::find_nearest_note(peak.frequency, &tuning) {
            Some(m) => {
                let state = state::evaluate(
                    peak.magnitude,
                    peak.frequency,
                    m.error_hz,
                    m.error_cents,
                    &self.thresholds,
                );
                TuningReading {
                    closest_note: m.closest_note,
                    target_freq: m.target_freq,
                    error_hz: m.error_hz,
                    error_cents: m.error_cents,
                    state,
                }
            }
            None => TuningReading {
                closest_note: String::new(),
                target_freq: 0.0,
                error_hz: 0.0,
                error_cents: 0.0,
                state: state::TuningState::Silent,
            },
        };

        let previous_state = self.tracker.update(reading.state);
        if let Some(previous) = previous_state {
            debug!(
                from = %previous,
                to = %reading.state,
                note = %reading.closest_note,
                peak_hz = peak.frequency,
                "tuning state changed"
            );
        }

        let now = Instant::now();
        let cycle_rate = self
            .last_cycle
            .map(|last| now.duration_since(last).as_secs_f32())
            .filter(|&elapsed| elapsed > 0.0)
            .map(|elapsed| 1.0 / elapsed);
        self.last_cycle = Some(now);

        AnalysisFrame {
            waveform,
            spectrum: fft::shift(&spectrum.values),
            frequencies: fft::shift(&spectrum.frequencies),
            peak,
            reading,
            previous_state,
            tuning_name: tuning.name.clone(),
            error_unit: self.error_unit,
            cycle_rate,
            paused: self.paused,
        }
    }

    /// Replaces the active tuning as a whole.
    ///
    /// # Errors
    /// * `Configuration` - no tuning with that name exists
    pub fn select_tuning(&mut self, name: &str) -> Result<()> {
        let tuning = self
            .library
            .find(name)
            .cloned()
            .ok_or_else(|| TunerError::Configuration(format!("unknown tuning '{name}'")))?;
        info!(tuning = %tuning.name, "switched tuning");
        self.active_tuning = Arc::new(tuning);
        Ok(())
    }

    pub fn active_tuning(&self) -> Arc<Tuning> {
        Arc::clone(&self.active_tuning)
    }

    pub fn library(&self) -> &TuningLibrary {
        &self.library
    }

    /// Flips the distortion effect and returns the command to send.
    pub fn toggle_effect(&mut self) -> EffectCommand {
        self.effect_enabled = !self.effect_enabled;
        EffectCommand::from_enabled(self.effect_enabled)
    }

    pub fn effect_enabled(&self) -> bool {
        self.effect_enabled
    }

    pub fn toggle_error_unit(&mut self) -> ErrorUnit {
        self.error_unit = self.error_unit.toggled();
        self.error_unit
    }

    /// Freezes the display. Buffering and analysis keep running.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn bin_width(&self) -> f32 {
        self.analyzer.bin_width()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::SpectrumScale;
    use crate::source::ToneSource;
    use crate::state::{Tolerance, TuningState};

    const SAMPLE_RATE: u32 = 8000;
    const WINDOW: usize = 1024;

    fn config(tolerance_hz: f32) -> TunerConfig {
        TunerConfig {
            window_size: WINDOW,
            sample_rate: SAMPLE_RATE,
            threshold: -15.0,
            in_tune_tolerance: Tolerance { value: tolerance_hz, unit: ErrorUnit::Hz },
            ..TunerConfig::default()
        }
    }

    fn a2_window() -> Vec<u8> {
        ToneSource::new(110.0, SAMPLE_RATE).generate(WINDOW)
    }

    #[test]
    fn a2_sine_is_detected_end_to_end() {
        let bin_width = SAMPLE_RATE as f32 / WINDOW as f32;
        let mut session = TunerSession::new(&config(bin_width)).unwrap();
        let frame = session.run_cycle(&a2_window());

        assert!((frame.peak.frequency - 110.0).abs() <= bin_width, "{}", frame.peak.frequency);
        assert_eq!(frame.reading.closest_note, "A2");
        assert_eq!(frame.reading.target_freq, 110.0);
        assert!(frame.reading.error_hz.abs() < bin_width);
        assert_eq!(frame.reading.state, TuningState::InTune);
        assert_eq!(frame.previous_state, Some(TuningState::Silent));
        assert_eq!(frame.tuning_name, "Standard");
    }

    #[test]
    fn tight_tolerance_reports_direction_of_error() {
        let mut session = TunerSession::new(&config(0.01)).unwrap();
        let frame = session.run_cycle(&a2_window());
        let expected = if frame.reading.error_hz < 0.0 { TuningState::Flat } else { TuningState::Sharp };
        assert_eq!(frame.reading.state, expected);
    }

    #[test]
    fn frame_arrays_have_window_length() {
        let mut session = TunerSession::new(&config(1.0)).unwrap();
        let frame = session.run_cycle(&a2_window());
        assert_eq!(frame.waveform.len(), WINDOW);
        assert_eq!(frame.spectrum.len(), WINDOW);
        assert_eq!(frame.frequencies.len(), WINDOW);
        assert!(frame.frequencies.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn silence_stays_silent_without_state_change() {
        let mut session = TunerSession::new(&config(1.0)).unwrap();
        let frame = session.run_cycle(&[128u8; WINDOW]);
        assert_eq!(frame.reading.state, TuningState::Silent);
        assert!(!frame.state_changed());
    }

    #[test]
    fn state_change_is_reported_once() {
        let mut session = TunerSession::new(&config(8.0)).unwrap();
        let first = session.run_cycle(&a2_window());
        let second = session.run_cycle(&[]);
        assert!(first.state_changed());
        assert!(!second.state_changed());
        assert_eq!(first.reading, second.reading);
        assert!(second.cycle_rate.is_some());
    }

    #[test]
    fn harmonic_rich_low_e_reports_fundamental() {
        let mut session = TunerSession::new(&config(8.0)).unwrap();
        let window = ToneSource::new(82.4, SAMPLE_RATE)
            .with_harmonics(vec![1.5, 0.8])
            .generate(WINDOW);
        let frame = session.run_cycle(&window);
        assert_eq!(frame.reading.closest_note, "E2");
    }

    #[test]
    fn linear_power_mode_detects_same_note() {
        let mut cfg = config(8.0);
        cfg.scale = SpectrumScale::Power;
        cfg.threshold = 1.0;
        cfg.apply_window = false;
        let mut session = TunerSession::new(&cfg).unwrap();
        let frame = session.run_cycle(&a2_window());
        assert_eq!(frame.reading.closest_note, "A2");
        assert!(frame.peak.above_threshold);
    }

    #[test]
    fn tuning_switch_replaces_active_table() {
        let mut session = TunerSession::new(&config(1.0)).unwrap();
        session.select_tuning("Drop D").unwrap();
        assert_eq!(session.active_tuning().notes[0].name, "D2");
        assert!(session.select_tuning("Banjo").is_err());
        assert_eq!(session.active_tuning().name, "Drop D");
    }

    #[test]
    fn toggles_flip_session_flags() {
        let mut session = TunerSession::new(&config(1.0)).unwrap();
        assert_eq!(session.toggle_effect(), EffectCommand::Enable);
        assert_eq!(session.toggle_effect(), EffectCommand::Disable);
        assert_eq!(session.toggle_error_unit(), ErrorUnit::Cents);
        assert!(session.toggle_pause());
        assert!(session.run_cycle(&[]).paused);
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut cfg = config(1.0);
        cfg.tuning = "Lute".to_string();
        assert!(matches!(TunerSession::new(&cfg), Err(TunerError::Configuration(_))));
    }
}
