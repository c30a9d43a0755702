//! UART receiver model
//!
//! Mirrors the transmitter timing but samples each bit at the middle of its
//! period. A falling edge is confirmed half a bit later; every data bit is
//! then sampled one full period after the previous sample.

use tracing::trace;

/// Receiver states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Waiting for a falling edge
    Idle,
    /// Confirming the start bit at its midpoint
    StartBit,
    /// Sampling data bits, LSB first
    DataBits,
    /// Waiting out the stop bit
    Cleanup,
}

/// Cycle-stepped UART receiver
#[derive(Debug, Clone)]
pub struct Receiver {
    clocks_per_bit: u32,
    state: RxState,
    clock_count: u32,
    bit_index: u8,
    shift: u8,
    new_byte: bool,
    byte_received: u8,
    framing_errors: u64,
}

impl Receiver {
    /// Create an idle receiver
    pub fn new(clocks_per_bit: u32) -> Self {
        Self {
            clocks_per_bit,
            state: RxState::Idle,
            clock_count: 0,
            bit_index: 0,
            shift: 0,
            new_byte: false,
            byte_received: 0,
            framing_errors: 0,
        }
    }

    /// Return to idle
    pub fn reset(&mut self) {
        *self = Self::new(self.clocks_per_bit);
    }

    /// Current state
    pub fn state(&self) -> RxState {
        self.state
    }

    /// One-cycle strobe: true only on the edge that completed a byte
    pub fn new_byte(&self) -> bool {
        self.new_byte
    }

    /// Last completed byte
    pub fn byte_received(&self) -> u8 {
        self.byte_received
    }

    /// Bytes whose stop bit was sampled low
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    /// Advance one rising clock edge with the current line level
    ///
    /// Returns the received byte on the cycle [`Receiver::new_byte`] is raised.
    pub fn posedge_clk(&mut self, line: bool) -> Option<u8> {
        self.new_byte = false;

        match self.state {
            RxState::Idle => {
                if !line {
                    self.state = RxState::StartBit;
                    self.clock_count = 0;
                }
            }
            RxState::StartBit => {
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit / 2 {
                    // A glitch shorter than half a bit is not a start bit
                    self.state = if line { RxState::Idle } else { RxState::DataBits };
                    self.clock_count = 0;
                    self.bit_index = 0;
                    self.shift = 0;
                }
            }
            RxState::DataBits => {
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit {
                    if line {
                        self.shift |= 1 << self.bit_index;
                    }
                    self.bit_index += 1;
                    if self.bit_index >= 8 {
                        self.state = RxState::Cleanup;
                    }
                    self.clock_count = 0;
                }
            }
            RxState::Cleanup => {
                self.clock_count += 1;
                if self.clock_count >= self.clocks_per_bit {
                    if !line {
                        self.framing_errors += 1;
                        trace!(byte = self.shift, "stop bit sampled low");
                    }
                    self.state = RxState::Idle;
                    self.clock_count = 0;
                    self.new_byte = true;
                    self.byte_received = self.shift;
                    return Some(self.byte_received);
                }
            }
        }
        None
    }
}
