use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use joltlink_host::{config::Config, port, telemetry, transfer, CommandSource};
use joltlink_protocol::Command;
use joltlink_sim::{baud_error_ppm, LoopbackHarness, TargetSumResponder};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "joltlink", version)]
#[command(about = "Stream commands to a joltlink peripheral and collect its answers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (ignored when RUST_LOG is set)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send the input to a real peripheral over a serial port
    Run {
        /// Serial device
        #[arg(long, short)]
        port: Option<String>,

        #[arg(long, short)]
        baud: Option<u32>,

        /// Commands allowed in flight
        #[arg(long, short)]
        window: Option<usize>,

        /// Abort if the transfer takes longer than this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Command file, one command per line
        input: Option<PathBuf>,
    },
    /// Run the input through the bit-level link simulation
    Simulate {
        #[arg(long)]
        clock_hz: Option<u32>,

        #[arg(long, short)]
        baud: Option<u32>,

        #[arg(long, short)]
        window: Option<usize>,

        /// Peripheral processing time per command, in clock cycles
        #[arg(long)]
        latency: Option<u64>,

        /// Command file, one command per line
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Run {
            port,
            baud,
            window,
            deadline,
            input,
        } => {
            if let Some(port) = port {
                config.link.port = port;
            }
            if let Some(baud) = baud {
                config.link.baud_rate = baud;
            }
            if let Some(window) = window {
                config.flow.window = window;
            }
            if deadline.is_some() {
                config.flow.deadline_secs = deadline;
            }
            if let Some(input) = input {
                config.input.path = input;
            }
            config.validate()?;
            run(&config)
        }
        Commands::Simulate {
            clock_hz,
            baud,
            window,
            latency,
            input,
        } => {
            if let Some(clock_hz) = clock_hz {
                config.sim.clock_hz = clock_hz;
            }
            if let Some(baud) = baud {
                config.link.baud_rate = baud;
            }
            if let Some(window) = window {
                config.flow.window = window;
            }
            if let Some(latency) = latency {
                config.sim.latency_cycles = latency;
            }
            if let Some(input) = input {
                config.input.path = input;
            }
            config.validate()?;
            simulate(&config)
        }
    }
}

fn open_input(path: &Path) -> Result<CommandSource<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(CommandSource::from_reader(BufReader::new(file)))
}

fn run(config: &Config) -> Result<()> {
    let started = Instant::now();

    let (tx, rx) = port::open(&config.link)?;
    let commands = open_input(&config.input.path)?;

    let report = transfer::run(tx, rx, commands, &config.flow.transfer())
        .with_context(|| format!("transfer over {} failed", config.link.port))?;

    print_summary(report.results.len(), report.sum(), started.elapsed());
    Ok(())
}

fn simulate(config: &Config) -> Result<()> {
    let started = Instant::now();
    let harness_config = config.harness();

    let ppm = baud_error_ppm(harness_config.clock_hz, harness_config.baud_rate)?;
    if ppm != 0 {
        warn!(ppm, "baud rate is not an exact divisor of the clock");
    }

    let commands = open_input(&config.input.path)?
        .collect::<Result<Vec<Command>, _>>()
        .context("parsing input")?;

    let mut harness = LoopbackHarness::new(harness_config, TargetSumResponder)?;
    let report = harness.run(commands).context("simulation failed")?;

    info!(
        cycles = report.cycles,
        simulated_us = report.simulated_time().as_micros() as u64,
        peak_pending = report.peak_pending,
        "simulation complete"
    );
    print_summary(report.results.len(), report.sum(), started.elapsed());
    Ok(())
}

fn print_summary(responses: usize, sum: u64, elapsed: Duration) {
    println!("Responses: {responses}");
    println!("Sum: {sum}");
    println!("Execution time: {} microseconds", elapsed.as_micros());
}
