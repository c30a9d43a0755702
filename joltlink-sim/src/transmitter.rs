//! UART transmitter model
//!
//! Serializes queued bytes onto a single line: one low start bit, eight
//! data bits LSB first, one high stop bit. The line idles high.

use std::collections::VecDeque;

/// Transmitter states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Line high, waiting for a queued byte
    Idle,
    /// Driving the start bit (low)
    StartBit,
    /// Driving data bits, LSB first
    DataBits,
    /// Driving the stop bit (high)
    StopBit,
}

/// Cycle-stepped UART transmitter
#[derive(Debug, Clone)]
pub struct Transmitter {
    clocks_per_bit: u32,
    state: TxState,
    clock_count: u32,
    bit_index: u8,
    latched: u8,
    queue: VecDeque<u8>,
}

impl Transmitter {
    /// Create an idle transmitter
    pub fn new(clocks_per_bit: u32) -> Self {
        Self {
            clocks_per_bit,
            state: TxState::Idle,
            clock_count: 0,
            bit_index: 0,
            latched: 0,
            queue: VecDeque::new(),
        }
    }

    /// Return to idle and drop anything queued
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
        self.clock_count = 0;
        self.bit_index = 0;
        self.latched = 0;
        self.queue.clear();
    }

    /// Queue a byte for transmission
    pub fn queue_byte(&mut self, byte: u8) {
        self.queue.push_back(byte);
    }

    /// Queue several bytes for transmission, in order
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }

    /// Bytes waiting behind the one currently on the line
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Current state
    pub fn state(&self) -> TxState {
        self.state
    }

    /// True when nothing is on the line and nothing is queued
    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle && self.queue.is_empty()
    }

    /// Advance one rising clock edge and return the line level for this cycle
    pub fn posedge_clk(&mut self) -> bool {
        match self.state {
            TxState::Idle => {
                if let Some(byte) = self.queue.pop_front() {
                    self.latched = byte;
                    self.state = TxState::StartBit;
                    self.clock_count = 0;
                }
                true
            }
            TxState::StartBit => {
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit {
                    self.state = TxState::DataBits;
                    self.clock_count = 0;
                    self.bit_index = 0;
                }
                false
            }
            TxState::DataBits => {
                let bit = (self.latched >> self.bit_index) & 1 == 1;
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit {
                    self.bit_index += 1;
                    if self.bit_index >= 8 {
                        self.state = TxState::StopBit;
                    }
                    self.clock_count = 0;
                }
                bit
            }
            TxState::StopBit => {
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit {
                    self.state = TxState::Idle;
                    self.clock_count = 0;
                }
                true
            }
        }
    }
}
