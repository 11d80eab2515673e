use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, Args, ArgEnum};
use console::style;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use egis_probe::analysis::Analysis;
use egis_probe::artifact::ArtifactStore;
use egis_probe::fixture::{self, Fixture};
use egis_probe::sequence::{run_sequence, CountdownGate, Gate, NoGate, RunOptions};
use egis_probe::{probe, CommandFrame, Error, Result, Thresholds, Tier, UsbSession};

use crate::gate::{stdin_lines, ConsoleGate};
use crate::poll::{poll, PollOptions};

mod gate;
mod info;
mod poll;
mod report;

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    /// Command tables and device settings.
    #[clap(long, global=true)]
    pub fixture: Option<PathBuf>,

    #[clap(long, global=true, parse(try_from_str=parse_hex_u16))]
    pub vendor_id: Option<u16>,

    #[clap(long, global=true, parse(try_from_str=parse_hex_u16))]
    pub product_id: Option<u16>,

    #[clap(short, long, global=true, parse(from_occurrences))]
    pub verbose: u64,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum ThresholdPreset {
    Fixture,
    Standard,
    Adaptive,
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum GateMode {
    Enter,
    Countdown,
    None,
}

#[derive(Args)]
pub(crate) struct ProbeArgs {
    /// Frame bytes in hex, e.g. `45 47 49 53 60 00 fc`.
    #[clap(required=true)]
    pub frame: Vec<String>,

    #[clap(long, default_value_t=64)]
    pub length: usize,

    #[clap(long, default_value_t=2000)]
    pub timeout_ms: u64,

    #[clap(long)]
    pub save: Option<PathBuf>,

    #[clap(long, arg_enum, default_value="fixture")]
    pub thresholds: ThresholdPreset,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Sequences to replay in order. Lists the available ones when empty.
    pub sequences: Vec<String>,

    #[clap(long)]
    pub save: Option<PathBuf>,

    #[clap(long, arg_enum, default_value="enter")]
    pub gate: GateMode,

    /// Operator head start for `--gate countdown`, or how long `--gate enter`
    /// waits before continuing on its own.
    #[clap(long)]
    pub countdown_s: Option<u64>,

    #[clap(long, arg_enum, default_value="fixture")]
    pub thresholds: ThresholdPreset,

    /// Overrides the fixture's save tier.
    #[clap(long)]
    pub save_tier: Option<Tier>,
}

#[derive(Args)]
pub(crate) struct PollArgs {
    #[clap(long, default_value_t=50)]
    pub interval_ms: u64,

    /// Stop after this long. Otherwise runs until Enter.
    #[clap(long)]
    pub duration_s: Option<u64>,

    #[clap(long, default_value_t=5)]
    pub status_s: u64,

    #[clap(long)]
    pub save: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct AnalyzeArgs {
    #[clap(required=true)]
    pub files: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Describe the sensor's descriptors.
    #[clap(name="info")]
    Info,

    /// Send one frame and grade the response.
    #[clap(name="probe")]
    Probe(ProbeArgs),

    /// Replay named command sequences from the fixture.
    #[clap(name="run")]
    Run(RunArgs),

    /// Listen on the IN endpoints without sending.
    #[clap(name="poll")]
    Poll(PollArgs),

    /// Inspect saved response dumps.
    #[clap(name="analyze")]
    Analyze(AnalyzeArgs),
}

fn parse_hex_u16(s: &str) -> std::result::Result<u16, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("{s:?}: {e}"))
}

fn init_tracing(verbose: u64) {
    match EnvFilter::builder().with_env_var("EH576_LOG").try_from_env() {
        Ok(filter) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        },
        Err(_) => {
            let level = match verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            };
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .init();
        },
    }
}

fn load_fixture(args: &Cli) -> Result<Fixture> {
    let mut fixture = match &args.fixture {
        Some(path) => Fixture::load(path)?,
        None => {
            let path = fixture::default_path();
            if path.exists() {
                Fixture::load(&path)?
            } else {
                info!(path = %path.display(), "no fixture, using built-in device settings");
                Fixture::parse("sequences: []", &path)?
            }
        },
    };

    if let Some(vendor_id) = args.vendor_id {
        fixture.device.vendor_id = vendor_id;
    }
    if let Some(product_id) = args.product_id {
        fixture.device.product_id = product_id;
    }

    Ok(fixture)
}

fn thresholds(preset: ThresholdPreset, fixture: &Fixture) -> Thresholds {
    match preset {
        ThresholdPreset::Fixture  => fixture.thresholds,
        ThresholdPreset::Standard => Thresholds::standard(),
        ThresholdPreset::Adaptive => Thresholds::adaptive(),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if let Commands::Analyze(a) = &args.command {
        return analyze(a);
    }

    let fixture = load_fixture(&args)?;
    let mut context = rusb::Context::new()?;

    match args.command {
        Commands::Analyze(_) => {},
        Commands::Info => {
            info::device_info(&context, &fixture.device)?;
        },
        Commands::Probe(a) => {
            let frame: CommandFrame = a.frame.join(" ").parse()?;
            let thresholds = thresholds(a.thresholds, &fixture);
            let mut session = UsbSession::open(&mut context, &fixture.device)?;

            println!("\t-> {frame}");
            let outcome = probe(&mut session, &frame, a.length, Duration::from_millis(a.timeout_ms))?;
            report::print_outcome(&outcome);

            if let Some(response) = outcome.response() {
                println!("\tquality: {}", report::classification(&thresholds.classify(response.data())));
                if let Some(dir) = &a.save {
                    let path = ArtifactStore::new(dir).save(&format!("probe {frame}"), response.data())?;
                    println!("\tsaved: {}", path.display());
                }
            }

            session.release()?;
        },
        Commands::Run(a) => {
            if a.sequences.is_empty() {
                println!("Sequences:");
                for sequence in &fixture.sequences {
                    println!("\t{:24} {} command(s) x{}", sequence.name, sequence.commands.len(), sequence.repeat);
                }
                return Ok(());
            }

            let sequences = a.sequences.iter()
                .map(|name| fixture.sequence(name).ok_or_else(|| Error::Fixture {
                    path: args.fixture.clone().unwrap_or_else(fixture::default_path),
                    message: format!("no sequence named {name:?}"),
                }))
                .collect::<Result<Vec<_>>>()?;

            let store = a.save.as_ref().map(ArtifactStore::new);
            let options = RunOptions {
                thresholds: thresholds(a.thresholds, &fixture),
                save_tier: a.save_tier.unwrap_or(fixture.save_tier),
                store: store.as_ref(),
            };

            let countdown = a.countdown_s.map(Duration::from_secs);
            let mut gate: Box<dyn Gate> = match a.gate {
                GateMode::Enter     => Box::new(ConsoleGate::new(stdin_lines()?, countdown)),
                GateMode::Countdown => Box::new(CountdownGate { delay: countdown.unwrap_or(Duration::from_secs(3)) }),
                GateMode::None      => Box::new(NoGate),
            };

            let mut session = UsbSession::open(&mut context, &fixture.device)?;

            for sequence in sequences {
                println!("{}", style(format!("== {} ==", sequence.name)).bold().cyan());
                let report = run_sequence(&mut session, sequence, &options, gate.as_mut(), report::print_step)?;
                report::print_summary(&report);
                if report.aborted {
                    break;
                }
            }

            session.release()?;
        },
        Commands::Poll(a) => {
            let store = a.save.as_ref().map(ArtifactStore::new);
            let options = PollOptions {
                interval: Duration::from_millis(a.interval_ms.max(1)),
                duration: a.duration_s.map(Duration::from_secs),
                status_interval: Duration::from_secs(a.status_s.max(1)),
                store: store.as_ref(),
            };

            let mut session = UsbSession::open(&mut context, &fixture.device)?;
            println!("Polling, press Enter to stop");
            let stats = poll(&mut session, &options, stdin_lines()?)?;
            println!("{} polls, {} responses, {} errors", stats.polls, stats.responses, stats.errors);

            session.release()?;
        },
    }

    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let mut results = Vec::new();

    for path in &args.files {
        let data = fs::read(path)?;
        let analysis = Analysis::of(&data);
        report::print_analysis(path, &analysis);
        results.push((path.as_path(), analysis));
    }

    if results.len() > 1 {
        println!();
        report::print_analysis_summary(&results);
    }

    Ok(())
}
