use std::{path::PathBuf, thread, time::Duration};

use serde::Deserialize;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::classify::{Classification, Thresholds, Tier};
use crate::error::Result;
use crate::frame::CommandFrame;
use crate::probe::{probe, Outcome};
use crate::transport::Transport;

/// One named command within a sequence.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub name: String,
    pub frame: CommandFrame,
    #[serde(default = "Step::default_response_length")]
    pub response_length: usize,
    /// Classify the response and keep it if it is good enough.
    #[serde(default)]
    pub capture: bool,
    /// Overrides the sequence timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Operator prompt to wait on before sending, every cycle.
    #[serde(default)]
    pub gate: Option<String>,
}

impl Step {
    fn default_response_length() -> usize {
        64
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sequence {
    pub name: String,
    pub commands: Vec<Step>,
    #[serde(default = "Sequence::default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "Sequence::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "Sequence::default_repeat")]
    pub repeat: usize,
    #[serde(default)]
    pub cycle_pause_ms: u64,
}

impl Sequence {
    fn default_delay_ms() -> u64 {
        200
    }

    fn default_timeout_ms() -> u64 {
        2000
    }

    fn default_repeat() -> usize {
        1
    }

    pub fn step_timeout(&self, step: &Step) -> Duration {
        Duration::from_millis(step.timeout_ms.unwrap_or(self.timeout_ms))
    }
}

///////////////////////////////////////////////////////////////////////

/// Blocks until the operator is ready. Returning `false` ends the run.
pub trait Gate {
    fn wait(&mut self, prompt: &str) -> bool;
}

pub struct NoGate;

impl Gate for NoGate {
    fn wait(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Prints the prompt and gives the operator a fixed head start.
pub struct CountdownGate {
    pub delay: Duration,
}

impl Gate for CountdownGate {
    fn wait(&mut self, prompt: &str) -> bool {
        println!("{prompt}");
        thread::sleep(self.delay);
        true
    }
}

///////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub cycle: usize,
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
    pub classification: Option<Classification>,
    pub saved: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceReport {
    pub name: String,
    pub cycles: usize,
    pub steps: Vec<StepRecord>,
    pub aborted: bool,
}

impl SequenceReport {
    pub fn timeouts(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == Outcome::TimedOut).count()
    }

    /// Captures that reached `Good` or better.
    pub fn successful_captures(&self) -> usize {
        self.steps.iter()
            .filter_map(|s| s.classification)
            .filter(|c| c.tier >= Tier::Good)
            .count()
    }

    pub fn best(&self) -> Option<&StepRecord> {
        self.steps.iter()
            .filter(|s| s.classification.is_some())
            .max_by(|a, b| {
                let a = a.classification.map(|c| (c.tier, c.non_zero_ratio));
                let b = b.classification.map(|c| (c.tier, c.non_zero_ratio));
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

pub struct RunOptions<'a> {
    pub thresholds: Thresholds,
    /// Captures at or above this tier are saved.
    pub save_tier: Tier,
    pub store: Option<&'a ArtifactStore>,
}

/// Probe every step of `sequence` in order, `repeat` times.
///
/// Timeouts are recorded and skipped. The first error ends the run and is
/// returned as-is; steps already completed were reported through `on_step`.
///
pub fn run_sequence<T, G, F>(
    session: &mut T,
    sequence: &Sequence,
    options: &RunOptions,
    gate: &mut G,
    mut on_step: F,
) -> Result<SequenceReport>
where
    T: Transport + ?Sized,
    G: Gate + ?Sized,
    F: FnMut(&StepRecord),
{
    let mut report = SequenceReport {
        name: sequence.name.clone(),
        ..SequenceReport::default()
    };
    let delay = Duration::from_millis(sequence.delay_ms);

    for cycle in 0..sequence.repeat {
        if cycle > 0 && sequence.cycle_pause_ms > 0 {
            thread::sleep(Duration::from_millis(sequence.cycle_pause_ms));
        }
        debug!(sequence = %sequence.name, cycle, "cycle start");

        for (index, step) in sequence.commands.iter().enumerate() {
            if let Some(prompt) = &step.gate {
                if !gate.wait(prompt) {
                    info!(sequence = %sequence.name, cycle, step = %step.name, "stopped at gate");
                    report.aborted = true;
                    return Ok(report);
                }
            }

            let outcome = probe(session, &step.frame, step.response_length, sequence.step_timeout(step))?;

            let mut classification = None;
            let mut saved = None;
            if let (true, Outcome::Received(response)) = (step.capture, &outcome) {
                let c = options.thresholds.classify(response.data());
                if c.tier >= options.save_tier && c.tier > Tier::Empty {
                    if let Some(store) = options.store {
                        saved = Some(store.save(&step.name, response.data())?);
                    }
                }
                classification = Some(c);
            }

            let record = StepRecord {
                cycle,
                index,
                name: step.name.clone(),
                outcome,
                classification,
                saved,
            };
            on_step(&record);
            report.steps.push(record);

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        report.cycles += 1;
    }

    Ok(report)
}
