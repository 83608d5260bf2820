//! # Serial Guitar Tuner - Command Line Front End
//!
//! Connects the headless tuner core to a serial sample stream (or a
//! simulated tone) and renders the readings in the terminal.
//!
//! ## Architecture
//! - **Main Thread**: analysis loop driven by `tuner_core::driver`
//! - **Reader Thread**: blocking serial reads, chunks handed over a channel
//! - **Command Thread**: stdin commands turned into control messages
//! - **Shutdown**: Ctrl-C or `q` sends a shutdown control

mod commands;
mod display;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tuner_core::config::TunerConfig;
use tuner_core::driver::{self, Control, DriverSettings};
use tuner_core::fft::SpectrumScale;
use tuner_core::session::TunerSession;
use tuner_core::source::{SampleSource, SerialSource, ToneSource};
use tuner_core::state::{ErrorUnit, Tolerance};

use display::TerminalDisplay;

const DEVICE_HELP: &str = "\
serial device streaming unsigned 8-bit samples (e.g. /dev/ttyACM0).

The tuner does not change line settings. Put the port in raw mode at the
firmware's baud rate first, otherwise the tty line-buffers the stream and
interprets bytes such as 0x0A and 0x04:

    stty -F /dev/ttyACM0 raw -echo 1000000";

/// command-line interface for the tuner
#[derive(Parser, Debug)]
#[command(name = "tuner")]
#[command(about = "real-time guitar tuner for an 8-bit serial sample stream")]
struct Cli {
    /// serial device streaming unsigned 8-bit samples (e.g. /dev/ttyACM0)
    #[arg(short, long, conflicts_with = "simulate", long_help = DEVICE_HELP)]
    device: Option<PathBuf>,

    /// run without hardware using a synthetic tone at this frequency (Hz)
    #[arg(long)]
    simulate: Option<f32>,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// FFT window size in samples
    #[arg(short, long)]
    window_size: Option<usize>,

    /// nominal sample rate of the source in Hz
    #[arg(short, long)]
    sample_rate: Option<u32>,

    /// peak detection threshold (dB, or linear power with --linear)
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<f32>,

    /// use a linear power spectrum instead of decibels
    #[arg(long)]
    linear: bool,

    /// skip the Hann window
    #[arg(long)]
    no_window: bool,

    /// initial tuning (e.g. "Standard", "Drop D", "DADGAD")
    #[arg(short, long)]
    tuning: Option<String>,

    /// in-tune tolerance, in Hz unless --cents is given
    #[arg(long)]
    tolerance: Option<f32>,

    /// show the error and interpret --tolerance in cents
    #[arg(long)]
    cents: bool,

    /// stop after this many analysis cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// list available tunings and exit
    #[arg(long)]
    list_tunings: bool,
}

impl Cli {
    /// Applies command-line overrides on top of a loaded configuration.
    fn apply_overrides(&self, config: &mut TunerConfig) {
        if let Some(window_size) = self.window_size {
            config.window_size = window_size;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if self.linear {
            config.scale = SpectrumScale::Power;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.no_window {
            config.apply_window = false;
        }
        if let Some(tuning) = &self.tuning {
            config.tuning = tuning.clone();
        }
        if self.cents {
            config.error_unit = ErrorUnit::Cents;
        }
        if let Some(value) = self.tolerance {
            let unit = if self.cents { ErrorUnit::Cents } else { ErrorUnit::Hz };
            config.in_tune_tolerance = Tolerance { value, unit };
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TunerConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.list_tunings {
        for tuning in config.library()?.tunings() {
            let notes: Vec<String> = tuning
                .notes
                .iter()
                .map(|n| format!("{} {:.1}", n.name, n.frequency))
                .collect();
            println!("{:<16} {}", tuning.name, notes.join(", "));
        }
        return Ok(());
    }

    let mut session = TunerSession::new(&config)?;
    let mut settings = DriverSettings::from_config(&config);
    settings.max_cycles = cli.cycles;

    let mut source: Box<dyn SampleSource> = match (&cli.device, cli.simulate) {
        (Some(path), _) => Box::new(SerialSource::open(path, settings.chunk_size, config.window_size)?),
        (None, Some(frequency)) => {
            info!(frequency, "simulating tone source");
            Box::new(ToneSource::new(frequency, config.sample_rate).realtime(true))
        }
        (None, None) => bail!("no sample source: pass --device <PATH> or --simulate <HZ>"),
    };

    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    let shutdown_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(Control::Shutdown);
    })
    .context("failed to install Ctrl-C handler")?;

    let tuning_names = session.library().names().map(str::to_string).collect();
    commands::spawn_reader(control_tx, tuning_names);
    eprintln!("{}", commands::HELP);

    let mut display = TerminalDisplay::new(std::io::stdout());
    let summary = driver::run(&mut session, source.as_mut(), &mut display, &control_rx, &settings);
    display.finish();

    info!(cycles = summary.cycles, reason = ?summary.reason, "tuner stopped");
    Ok(())
}
