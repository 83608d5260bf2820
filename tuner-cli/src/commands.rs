//! # Command Input
//!
//! Reads single-line commands from stdin on a background thread and turns
//! them into [`Control`] messages for the analysis loop.

use crossbeam_channel::Sender;
use std::io::BufRead;
use std::thread;
use tuner_core::driver::Control;

pub const HELP: &str = "commands: t <tuning> | l (list tunings) | d (distortion) | u (Hz/cents) | p (pause) | q (quit)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Control(Control),
    ListTunings,
    Help,
    Unknown(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "t" | "tuning" if !rest.is_empty() => Command::Control(Control::SelectTuning(rest.to_string())),
        "l" | "list" => Command::ListTunings,
        "d" | "distortion" => Command::Control(Control::ToggleEffect),
        "u" | "units" => Command::Control(Control::ToggleErrorUnit),
        "p" | "pause" => Command::Control(Control::TogglePause),
        "q" | "quit" | "exit" => Command::Control(Control::Shutdown),
        "h" | "help" | "?" => Command::Help,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Spawns the stdin reader. The thread ends on EOF, on `quit`, or once the
/// analysis loop has dropped its receiver.
pub fn spawn_reader(controls: Sender<Control>, tuning_names: Vec<String>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(Command::Control(control)) => {
                    let quit = control == Control::Shutdown;
                    if controls.send(control).is_err() || quit {
                        break;
                    }
                }
                Some(Command::ListTunings) => eprintln!("tunings: {}", tuning_names.join(", ")),
                Some(Command::Help) => eprintln!("{HELP}"),
                Some(Command::Unknown(text)) => eprintln!("unknown command '{text}'. {HELP}"),
                None => {}
            }
        }
    });
}
