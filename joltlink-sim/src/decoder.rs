//! Response decoder model
//!
//! Sits on top of the receiver's byte stream: the first byte of a frame is a
//! payload length, the following bytes are accumulated little-endian until
//! that many have arrived. Produces the same values as
//! [`joltlink_protocol::decode_payload`] for the same bytes.

use joltlink_protocol::{decode_header, FrameError};

/// Decoder states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Idle,
    ReceivingData,
}

/// Two-state length-prefixed integer decoder
#[derive(Debug, Clone)]
pub struct Decoder {
    state: DecoderState,
    bytes_read: usize,
    bytes_to_read: usize,
    result: u64,
    decoded: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            bytes_read: 0,
            bytes_to_read: 0,
            result: 0,
            decoded: 0,
        }
    }

    /// Number of values emitted so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Whether the decoder is between frames
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Idle
    }

    /// Consume one received byte
    ///
    /// An invalid length byte leaves the decoder idle.
    pub fn decode(&mut self, byte: u8) -> Result<Option<u64>, FrameError> {
        match self.state {
            DecoderState::Idle => {
                self.bytes_to_read = decode_header(byte)?;
                self.bytes_read = 0;
                self.result = 0;
                self.state = DecoderState::ReceivingData;
                Ok(None)
            }
            DecoderState::ReceivingData => {
                self.result += (byte as u64) << (8 * self.bytes_read);
                self.bytes_read += 1;
                if self.bytes_read < self.bytes_to_read {
                    return Ok(None);
                }
                self.state = DecoderState::Idle;
                self.decoded += 1;
                Ok(Some(self.result))
            }
        }
    }
}
