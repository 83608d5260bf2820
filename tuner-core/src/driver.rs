//! # Driver Loop Module
//!
//! Schedules analysis cycles: read a chunk from the source, run the session,
//! hand the frame to the display, then wait one period while listening for
//! user controls. Controls are only applied between cycles, so a tuning
//! switch never lands in the middle of an analysis.

use crate::config::TunerConfig;
use crate::session::TunerSession;
use crate::source::SampleSource;
use crate::AnalysisFrame;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Requests from the user interface, applied between cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    SelectTuning(String),
    ToggleEffect,
    ToggleErrorUnit,
    TogglePause,
    Shutdown,
}

/// Consumer of analysis frames.
pub trait DisplaySink {
    /// Called once per cycle unless the display is paused.
    fn render(&mut self, frame: &AnalysisFrame);

    /// Short status messages (tuning switched, unknown tuning, ...).
    fn notice(&mut self, _message: &str) {}
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub chunk_size: usize,
    pub read_timeout: Duration,
    pub cycle_period: Duration,
    /// Stop after this many cycles. `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl DriverSettings {
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            chunk_size: config.effective_chunk_size(),
            read_timeout: config.read_timeout(),
            cycle_period: config.cycle_period(),
            max_cycles: None,
        }
    }
}

/// Why the loop ended and how much work it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    SourceExhausted,
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSummary {
    pub cycles: u64,
    pub reason: StopReason,
}

/// Applies one control message. Breaks on shutdown.
fn apply_control<S, D>(
    control: Control,
    session: &mut TunerSession,
    source: &mut S,
    sink: &mut D,
) -> ControlFlow<()>
where
    S: SampleSource + ?Sized,
    D: DisplaySink + ?Sized,
{
    match control {
        Control::Shutdown => return ControlFlow::Break(()),
        Control::SelectTuning(name) => match session.select_tuning(&name) {
            Ok(()) => sink.notice(&format!("Tuning: {}", session.active_tuning().name)),
            Err(e) => {
                warn!(error = %e, "tuning selection rejected");
                sink.notice(&e.to_string());
            }
        },
        Control::ToggleEffect => {
            let command = session.toggle_effect();
            match source.send_command(command) {
                Ok(()) => sink.notice(if session.effect_enabled() {
                    "Distortion on"
                } else {
                    "Distortion off"
                }),
                Err(e) => warn!(error = %e, ?command, "failed to send effect command"),
            }
        }
        Control::ToggleErrorUnit => {
            let unit = session.toggle_error_unit();
            sink.notice(&format!("Error unit: {}", unit.suffix()));
        }
        Control::TogglePause => {
            let paused = session.toggle_pause();
            sink.notice(if paused { "Paused" } else { "Resumed" });
        }
    }
    ControlFlow::Continue(())
}

/// Runs cycles until shutdown, source exhaustion or the cycle limit.
///
/// # Arguments
/// * `session` - Pipeline context, owned by the caller for the run
/// * `source` - Where samples come from and effect commands go
/// * `sink` - Display receiving one frame per cycle
/// * `controls` - User requests; a closed channel just means no more requests
/// * `settings` - Chunk size, timeouts and period
pub fn run<S, D>(
    session: &mut TunerSession,
    source: &mut S,
    sink: &mut D,
    controls: &Receiver<Control>,
    settings: &DriverSettings,
) -> DriverSummary
where
    S: SampleSource + ?Sized,
    D: DisplaySink + ?Sized,
{
    info!(
        chunk_size = settings.chunk_size,
        period_ms = settings.cycle_period.as_millis() as u64,
        "entering analysis loop"
    );
    let mut cycles = 0u64;
    let mut controls_open = true;

    let reason = 'cycles: loop {
        // Apply everything queued since the last cycle.
        while controls_open {
            match controls.try_recv() {
                Ok(control) => {
                    if apply_control(control, session, source, sink).is_break() {
                        break 'cycles StopReason::Shutdown;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => controls_open = false,
            }
        }

        if source.is_exhausted() {
            info!("sample source exhausted");
            break StopReason::SourceExhausted;
        }

        let samples = source.read_chunk(settings.chunk_size, settings.read_timeout);
        let frame = session.run_cycle(&samples);
        if !frame.paused {
            sink.render(&frame);
        }
        cycles += 1;

        if settings.max_cycles.is_some_and(|max| cycles >= max) {
            break StopReason::CycleLimit;
        }

        // Wait out the period, waking early for controls.
        let deadline = Instant::now() + settings.cycle_period;
        while controls_open {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match controls.recv_timeout(remaining) {
                Ok(control) => {
                    if apply_control(control, session, source, sink).is_break() {
                        break 'cycles StopReason::Shutdown;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => controls_open = false,
            }
        }
        if !controls_open {
            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
        }
    };

    info!(cycles, ?reason, "analysis loop stopped");
    DriverSummary { cycles, reason }
}
