use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use console::style;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::debug;

use egis_probe::sequence::Gate;
use egis_probe::Result;

/// Lines typed on stdin. The channel disconnects at end of input.
pub fn stdin_lines() -> Result<Receiver<String>> {
    let (sender, receiver) = unbounded();

    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        })?;

    Ok(receiver)
}

/// Waits for the operator to press Enter. `q` or end of input stops the run.
///
/// With a timeout the gate opens on its own once the timeout lapses.
///
pub struct ConsoleGate {
    lines: Receiver<String>,
    timeout: Option<Duration>,
}

impl ConsoleGate {
    pub fn new(lines: Receiver<String>, timeout: Option<Duration>) -> Self {
        Self { lines, timeout }
    }
}

impl Gate for ConsoleGate {
    fn wait(&mut self, prompt: &str) -> bool {
        // Only input typed after the prompt counts.
        while self.lines.try_recv().is_ok() {}

        print!("{} {}", style(prompt).bold().yellow(), style("[Enter to continue, q to stop] ").dim());
        let _ = io::stdout().flush();

        let line = match self.timeout {
            Some(timeout) => match self.lines.recv_timeout(timeout) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    println!();
                    return true;
                },
                Err(RecvTimeoutError::Disconnected) => return false,
            },
            None => match self.lines.recv() {
                Ok(line) => line,
                Err(_) => return false,
            },
        };

        !answer_stops(&line)
    }
}

fn answer_stops(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit")
}
