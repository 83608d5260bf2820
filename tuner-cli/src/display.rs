//! # Terminal Display
//!
//! Renders analysis frames on a single, continuously rewritten status line
//! with a text cent meter. State changes and notices are printed on their
//! own lines so they remain in the scrollback.
//!
//! ## Features
//! - Numeric readouts refreshed every cycle
//! - Cent meter needle with accuracy zones
//! - Instruction line only when the tuning state changes

use std::io::{self, Write};
use tracing::warn;
use tuner_core::driver::DisplaySink;
use tuner_core::state::TuningState;
use tuner_core::AnalysisFrame;

/// Maximum cent deviation range for the meter display.
/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;

/// Number of character cells in the meter, odd so there is a centre cell.
const METER_WIDTH: usize = 41;

/// Accuracy bands used to label the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    Close,
    Near,
    Far,
}

impl Accuracy {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            Accuracy::Close
        } else if cents.abs() < 20.0 {
            Accuracy::Near
        } else {
            Accuracy::Far
        }
    }

    fn needle(self) -> char {
        match self {
            Accuracy::Close => '|',
            Accuracy::Near => '+',
            Accuracy::Far => '#',
        }
    }
}

/// Draws the cent meter, e.g. `[---------|----+----------]`.
///
/// `None` draws an empty meter with only the centre mark.
pub fn cent_meter(cents: Option<f32>) -> String {
    let center = METER_WIDTH / 2;
    let mut cells = vec!['-'; METER_WIDTH];
    cells[center] = ':';

    if let Some(c) = cents.filter(|c| c.is_finite()) {
        let clamped_cents = c.clamp(-METER_RANGE, METER_RANGE);
        let position = (clamped_cents + METER_RANGE) / (2.0 * METER_RANGE) * (METER_WIDTH - 1) as f32;
        cells[position.round() as usize] = Accuracy::from_cents(c).needle();
    }

    let mut meter = String::with_capacity(METER_WIDTH + 2);
    meter.push('[');
    meter.extend(cells);
    meter.push(']');
    meter
}

/// Formats the numeric readout for one frame.
pub fn status_line(frame: &AnalysisFrame) -> String {
    let reading = &frame.reading;
    let fps = frame
        .cycle_rate
        .map(|rate| format!("{rate:5.1} fps"))
        .unwrap_or_else(|| "  -.- fps".to_string());

    if reading.state == TuningState::Silent {
        return format!("{:<16} {:>4} {} {:>9} {:>10}   {fps}", frame.tuning_name, "-", cent_meter(None), "-", "-");
    }

    let error = reading.error_in(frame.error_unit);
    format!(
        "{:<16} {:>4} {} {:>6.1} Hz {:>+7.1} {:<2} (target {:.1} Hz)   {fps}",
        frame.tuning_name,
        reading.closest_note,
        cent_meter(Some(reading.error_cents)),
        frame.peak.frequency,
        error,
        frame.error_unit.suffix(),
        reading.target_freq,
    )
}

/// Display sink writing to a terminal.
///
/// Write failures (a closed pipe, a vanished terminal) are logged once and
/// otherwise ignored; the analysis loop keeps running.
pub struct TerminalDisplay<W: Write> {
    out: W,
    line_open: bool,
    write_failed: bool,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, line_open: false, write_failed: false }
    }

    fn check(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            if !self.write_failed {
                warn!(error = %e, "terminal output failed, further write errors are suppressed");
                self.write_failed = true;
            }
        }
    }

    fn print_line(&mut self, text: &str) {
        if self.line_open {
            let result = write!(self.out, "\r\x1b[2K");
            self.check(result);
            self.line_open = false;
        }
        let result = writeln!(self.out, "{text}");
        self.check(result);
    }

    /// Ends the status line so the shell prompt starts on a fresh line.
    pub fn finish(&mut self) {
        if self.line_open {
            let result = writeln!(self.out);
            self.check(result);
            self.line_open = false;
        }
        let result = self.out.flush();
        self.check(result);
    }

    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn render(&mut self, frame: &AnalysisFrame) {
        if frame.state_changed() {
            let reading = &frame.reading;
            let text = match reading.state {
                TuningState::Silent => "-".to_string(),
                state => format!("{:<4} {}", reading.closest_note, state.instruction()),
            };
            self.print_line(&text);
        }

        let result = write!(self.out, "\r\x1b[2K{}", status_line(frame)).and_then(|()| self.out.flush());
        self.check(result);
        self.line_open = true;
    }

    fn notice(&mut self, message: &str) {
        self.print_line(&format!("** {message}"));
        let result = self.out.flush();
        self.check(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_core::pitch::PeakResult;
    use tuner_core::state::ErrorUnit;
    use tuner_core::TuningReading;

    fn frame(state: TuningState, previous: Option<TuningState>) -> AnalysisFrame {
        AnalysisFrame {
            waveform: vec![],
            spectrum: vec![],
            frequencies: vec![],
            peak: PeakResult { frequency: 112.0, magnitude: 3.0, bin: 14, above_threshold: true },
            reading: TuningReading {
                closest_note: "A2".into(),
                target_freq: 110.0,
                error_hz: 2.0,
                error_cents: 31.2,
                state,
            },
            previous_state: previous,
            tuning_name: "Standard".into(),
            error_unit: ErrorUnit::Hz,
            cycle_rate: Some(30.0),
            paused: false,
        }
    }

    #[test]
    fn meter_places_needle_by_cents() {
        let centred = cent_meter(Some(0.0));
        assert_eq!(centred.chars().nth(1 + METER_WIDTH / 2), Some('|'));
        let far_flat = cent_meter(Some(-80.0));
        assert_eq!(far_flat.chars().nth(1), Some('#'));
        let near_sharp = cent_meter(Some(10.0));
        assert!(near_sharp.contains('+'));
        assert_eq!(cent_meter(None).len(), METER_WIDTH + 2);
    }

    #[test]
    fn accuracy_bands() {
        assert_eq!(Accuracy::from_cents(-4.9), Accuracy::Close);
        assert_eq!(Accuracy::from_cents(12.0), Accuracy::Near);
        assert_eq!(Accuracy::from_cents(-25.0), Accuracy::Far);
    }

    #[test]
    fn status_line_shows_error_in_selected_unit() {
        let mut f = frame(TuningState::Sharp, None);
        assert!(status_line(&f).contains("+2.0 Hz"));
        f.error_unit = ErrorUnit::Cents;
        assert!(status_line(&f).contains("+31.2 c"));
        assert!(status_line(&frame(TuningState::Silent, None)).contains("Standard"));
    }

    #[test]
    fn instruction_printed_only_on_state_change() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.render(&frame(TuningState::Sharp, Some(TuningState::Silent)));
        display.render(&frame(TuningState::Sharp, None));
        display.finish();
        let output = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(output.matches("Tune Down").count(), 1);
    }

    /// Writer that rejects everything, like stdout after the reader hung up.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn closed_output_is_recorded_without_panicking() {
        let mut display = TerminalDisplay::new(ClosedPipe);
        assert!(!display.write_failed());
        display.render(&frame(TuningState::Flat, Some(TuningState::Silent)));
        display.notice("Paused");
        display.finish();
        assert!(display.write_failed());
    }
}
