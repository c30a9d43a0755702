//! Clocked loopback harness
//!
//! Drives the host-side transmitter, the simulated peripheral and the
//! host-side receiver/decoder from one clock, applying the same in-flight
//! window the threaded host uses. Nothing runs in parallel; each loop
//! iteration is one rising clock edge.

use std::time::Duration;

use joltlink_protocol::{Command, FrameError};
use thiserror::Error;
use tracing::{debug, info};

use crate::decoder::Decoder;
use crate::peripheral::{PeripheralConfig, Responder, SimulatedPeripheral};
use crate::receiver::Receiver;
use crate::timing::{clocks_per_bit, TimingError};
use crate::transmitter::Transmitter;

/// Simulation failures
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid timing: {0}")]
    Timing(#[from] TimingError),
    #[error("malformed response: {0}")]
    Malformed(#[from] FrameError),
    #[error("cycle budget of {cycles} exhausted after {decoded} of {sent} responses")]
    CycleBudgetExhausted { cycles: u64, decoded: usize, sent: usize },
    #[error("peripheral overrun: {overruns} command(s) dropped")]
    PeripheralOverrun { overruns: u64 },
}

/// Harness parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Simulated clock frequency
    pub clock_hz: u32,
    /// Simulated line rate
    pub baud_rate: u32,
    /// Maximum commands queued but not yet answered
    pub window: usize,
    /// Cycles held in reset before the first edge is clocked
    pub reset_cycles: u64,
    /// Give up after this many cycles
    pub max_cycles: u64,
    pub peripheral: PeripheralConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            clock_hz: 100_000_000,
            baud_rate: 5_000_000,
            window: 200,
            reset_cycles: 50,
            max_cycles: 1_000_000_000,
            peripheral: PeripheralConfig::default(),
        }
    }
}

/// Outcome of a simulated transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimReport {
    /// Decoded values, index `k` answering the `k`-th command
    pub results: Vec<u64>,
    /// Clock cycles elapsed, reset included
    pub cycles: u64,
    /// Clock frequency the cycles were counted at
    pub clock_hz: u32,
    /// Most commands the peripheral held at once
    pub peak_pending: usize,
}

impl SimReport {
    /// Wall-clock time the transfer would take on hardware
    pub fn simulated_time(&self) -> Duration {
        Duration::from_nanos(self.cycles.saturating_mul(1_000_000_000) / self.clock_hz as u64)
    }

    /// Sum of all decoded values
    pub fn sum(&self) -> u64 {
        self.results.iter().sum()
    }
}

/// Host + peripheral loopback driven by a single clock
pub struct LoopbackHarness<R> {
    config: HarnessConfig,
    host_tx: Transmitter,
    host_rx: Receiver,
    decoder: Decoder,
    device: SimulatedPeripheral<R>,
}

impl<R: Responder> LoopbackHarness<R> {
    pub fn new(config: HarnessConfig, responder: R) -> Result<Self, SimError> {
        let cpb = clocks_per_bit(config.clock_hz, config.baud_rate)?;
        debug!(clocks_per_bit = cpb, "harness timing");

        Ok(Self {
            config,
            host_tx: Transmitter::new(cpb),
            host_rx: Receiver::new(cpb),
            decoder: Decoder::new(),
            device: SimulatedPeripheral::new(cpb, config.peripheral, responder),
        })
    }

    /// Stream every command through the simulated link and collect the answers
    pub fn run<I>(&mut self, commands: I) -> Result<SimReport, SimError>
    where
        I: IntoIterator<Item = Command>,
    {
        self.host_tx.reset();
        self.host_rx.reset();
        self.decoder = Decoder::new();
        self.device.reset();

        let mut commands = commands.into_iter();
        let mut exhausted = false;
        let mut sent = 0usize;
        let mut results = Vec::new();
        // Reset holds every machine still; the line idles high
        let mut cycle = self.config.reset_cycles;

        loop {
            while !exhausted && sent - results.len() < self.config.window {
                match commands.next() {
                    Some(command) => {
                        self.host_tx.queue_bytes(&command.encode());
                        sent += 1;
                    }
                    None => exhausted = true,
                }
            }

            if exhausted && results.len() == sent {
                break;
            }
            if cycle >= self.config.max_cycles {
                return Err(SimError::CycleBudgetExhausted {
                    cycles: cycle,
                    decoded: results.len(),
                    sent,
                });
            }

            let to_device = self.host_tx.posedge_clk();
            let from_device = self.device.posedge_clk(to_device);
            if let Some(byte) = self.host_rx.posedge_clk(from_device) {
                if let Some(value) = self.decoder.decode(byte)? {
                    results.push(value);
                    info!("{}: {}", results.len(), value);
                }
            }

            if self.device.overruns() > 0 {
                return Err(SimError::PeripheralOverrun {
                    overruns: self.device.overruns(),
                });
            }
            cycle += 1;
        }

        Ok(SimReport {
            results,
            cycles: cycle,
            clock_hz: self.config.clock_hz,
            peak_pending: self.device.peak_pending(),
        })
    }
}
