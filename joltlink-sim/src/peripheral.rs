//! Simulated peripheral (device under test)
//!
//! Behavioral stand-in for the FPGA: receives command frames bit by bit,
//! hands each reassembled command to a [`Responder`], and transmits the
//! answer after a fixed latency. Answers leave in the order commands
//! arrived.

use std::collections::VecDeque;

use joltlink_protocol::{encode_response, Command, CommandParser};
use tracing::{debug, warn};

use crate::receiver::Receiver;
use crate::transmitter::Transmitter;

/// Computes the value the peripheral answers a command with
pub trait Responder {
    fn respond(&mut self, command: &Command) -> u64;
}

impl<F> Responder for F
where
    F: FnMut(&Command) -> u64,
{
    fn respond(&mut self, command: &Command) -> u64 {
        self(command)
    }
}

/// Link-test responder: answers with the sum of the command's targets
///
/// Lets the host check ordering and decoding end to end without the real
/// solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetSumResponder;

impl Responder for TargetSumResponder {
    fn respond(&mut self, command: &Command) -> u64 {
        command.targets().iter().map(|&t| t as u64).sum()
    }
}

/// Peripheral behavior parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Commands the peripheral can hold before it has answered them
    pub capacity: usize,
    /// Clock cycles between receiving a command and queuing its answer
    pub latency_cycles: u64,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            latency_cycles: 0,
        }
    }
}

/// A command waiting out its processing latency
#[derive(Debug, Clone, Copy)]
struct PendingAnswer {
    ready_at: u64,
    value: u64,
}

/// Cycle-stepped model of the peripheral
pub struct SimulatedPeripheral<R> {
    config: PeripheralConfig,
    rx: Receiver,
    parser: CommandParser,
    tx: Transmitter,
    responder: R,
    pending: VecDeque<PendingAnswer>,
    cycle: u64,
    commands_received: u64,
    overruns: u64,
    peak_pending: usize,
}

impl<R: Responder> SimulatedPeripheral<R> {
    pub fn new(clocks_per_bit: u32, config: PeripheralConfig, responder: R) -> Self {
        Self {
            config,
            rx: Receiver::new(clocks_per_bit),
            parser: CommandParser::new(),
            tx: Transmitter::new(clocks_per_bit),
            responder,
            pending: VecDeque::new(),
            cycle: 0,
            commands_received: 0,
            overruns: 0,
            peak_pending: 0,
        }
    }

    /// Return to the power-on state
    pub fn reset(&mut self) {
        self.rx.reset();
        self.parser.reset();
        self.tx.reset();
        self.pending.clear();
        self.cycle = 0;
        self.commands_received = 0;
        self.overruns = 0;
        self.peak_pending = 0;
    }

    /// Commands fully received so far, including dropped ones
    pub fn commands_received(&self) -> u64 {
        self.commands_received
    }

    /// Commands dropped because the peripheral was full
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Most commands ever held at once
    pub fn peak_pending(&self) -> usize {
        self.peak_pending
    }

    /// Advance one rising clock edge
    ///
    /// `line_in` is the level driven by the host; the return value is the
    /// level the peripheral drives back.
    pub fn posedge_clk(&mut self, line_in: bool) -> bool {
        if let Some(byte) = self.rx.posedge_clk(line_in) {
            if let Some(command) = self.parser.feed(byte) {
                self.accept(command);
            }
        }

        while let Some(answer) = self.pending.front() {
            if answer.ready_at > self.cycle {
                break;
            }
            self.tx.queue_bytes(&encode_response(answer.value));
            self.pending.pop_front();
        }

        self.cycle += 1;
        self.tx.posedge_clk()
    }

    fn accept(&mut self, command: Command) {
        self.commands_received += 1;

        if self.pending.len() >= self.config.capacity {
            self.overruns += 1;
            warn!(
                index = self.commands_received,
                capacity = self.config.capacity,
                "peripheral overrun, command dropped"
            );
            return;
        }

        let value = self.responder.respond(&command);
        debug!(index = self.commands_received, value, "peripheral answered");
        self.pending.push_back(PendingAnswer {
            ready_at: self.cycle + self.config.latency_cycles,
            value,
        });
        self.peak_pending = self.peak_pending.max(self.pending.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;

    fn drive(
        device: &mut SimulatedPeripheral<impl Responder>,
        commands: &[Command],
        cpb: u32,
        cycles: usize,
    ) -> Vec<u64> {
        let mut host_tx = Transmitter::new(cpb);
        let mut host_rx = Receiver::new(cpb);
        let mut decoder = Decoder::new();
        for command in commands {
            host_tx.queue_bytes(&command.encode());
        }

        let mut values = Vec::new();
        for _ in 0..cycles {
            let out = device.posedge_clk(host_tx.posedge_clk());
            if let Some(byte) = host_rx.posedge_clk(out) {
                if let Some(v) = decoder.decode(byte).unwrap() {
                    values.push(v);
                }
            }
        }
        values
    }

    #[test]
    fn test_target_sum_responder() {
        let cmd = Command::new(&[1, 2], &[5, 12, 3]).unwrap();
        assert_eq!(TargetSumResponder.respond(&cmd), 20);
    }

    #[test]
    fn test_answers_in_order() {
        let cpb = 4;
        let commands = [
            Command::new(&[0b11], &[5, 12]).unwrap(),
            Command::new(&[0b100], &[300]).unwrap(),
            Command::new(&[], &[]).unwrap(),
        ];
        let mut device =
            SimulatedPeripheral::new(cpb, PeripheralConfig::default(), TargetSumResponder);

        let values = drive(&mut device, &commands, cpb, 5_000);
        assert_eq!(values, vec![17, 300, 0]);
        assert_eq!(device.commands_received(), 3);
        assert_eq!(device.overruns(), 0);
    }

    #[test]
    fn test_closure_responder() {
        let cpb = 2;
        let commands = [Command::new(&[0x3FF, 0x1], &[]).unwrap()];
        let mut device = SimulatedPeripheral::new(
            cpb,
            PeripheralConfig::default(),
            |c: &Command| c.buttons().len() as u64 * 1_000_000,
        );
        let values = drive(&mut device, &commands, cpb, 2_000);
        assert_eq!(values, vec![2_000_000]);
    }

    #[test]
    fn test_overrun_drops_commands() {
        let cpb = 2;
        let config = PeripheralConfig {
            capacity: 1,
            latency_cycles: 1_000_000,
        };
        let commands = [
            Command::new(&[], &[1]).unwrap(),
            Command::new(&[], &[2]).unwrap(),
        ];
        let mut device = SimulatedPeripheral::new(cpb, config, TargetSumResponder);
        let values = drive(&mut device, &commands, cpb, 3_000);
        assert!(values.is_empty());
        assert_eq!(device.commands_received(), 2);
        assert_eq!(device.overruns(), 1);
        assert_eq!(device.peak_pending(), 1);
    }
}
