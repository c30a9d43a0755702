//! Response frame encoding and decoding
//!
//! Frame format:
//! - LENGTH (1 byte): number of value bytes that follow (1-8)
//! - VALUE (LENGTH bytes): unsigned integer, least significant byte first

use heapless::Vec;

use crate::error::FrameError;

/// Largest payload a response may declare
pub const MAX_RESPONSE_BYTES: usize = 8;

/// Maximum complete response size (LENGTH + MAX_RESPONSE_BYTES)
pub const MAX_RESPONSE_FRAME_SIZE: usize = 1 + MAX_RESPONSE_BYTES;

/// Validate a header byte and return the payload length it declares
///
/// `0` is rejected because it would make an empty response indistinguishable
/// from a decoded zero.
pub fn decode_header(byte: u8) -> Result<usize, FrameError> {
    match byte as usize {
        1..=MAX_RESPONSE_BYTES => Ok(byte as usize),
        _ => Err(FrameError::InvalidLength(byte)),
    }
}

/// Reassemble a little-endian value from `length` payload bytes
///
/// Fails with [`FrameError::Truncated`] if fewer than `length` bytes are
/// available.
pub fn decode_payload(bytes: &[u8], length: usize) -> Result<u64, FrameError> {
    if length == 0 || length > MAX_RESPONSE_BYTES {
        return Err(FrameError::InvalidLength(length.min(u8::MAX as usize) as u8));
    }
    if bytes.len() < length {
        return Err(FrameError::Truncated {
            expected: length as u8,
            received: bytes.len() as u8,
        });
    }

    Ok(bytes[..length]
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i)))
}

/// Encode a value as the shortest valid response frame
///
/// Zero still uses one payload byte.
pub fn encode_response(value: u64) -> Vec<u8, MAX_RESPONSE_FRAME_SIZE> {
    let bytes = value.to_le_bytes();
    let significant = MAX_RESPONSE_BYTES - (value.leading_zeros() as usize / 8);
    let length = significant.max(1);

    let mut frame = Vec::new();
    let _ = frame.push(length as u8);
    let _ = frame.extend_from_slice(&bytes[..length]);
    frame
}

/// State machine for decoding the inbound response stream
///
/// Mirrors [`decode_header`] and [`decode_payload`] one byte at a time.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    state: ParseState,
    expected: usize,
    received: usize,
    value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for the LENGTH header
    WaitingForHeader,
    /// Accumulating value bytes
    ReadingPayload,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForHeader,
            expected: 0,
            received: 0,
            value: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForHeader;
        self.expected = 0;
        self.received = 0;
        self.value = 0;
    }

    /// Whether the parser is between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForHeader
    }

    /// Payload bytes still owed by the current frame
    pub fn remaining(&self) -> usize {
        self.expected - self.received
    }

    /// Report a frame that stopped mid-payload and reset
    pub fn truncate(&mut self) -> FrameError {
        let err = FrameError::Truncated {
            expected: self.expected as u8,
            received: self.received as u8,
        };
        self.reset();
        err
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(value))` when a complete response is decoded,
    /// `Ok(None)` when more bytes are needed, or `Err` on an invalid header.
    pub fn feed(&mut self, byte: u8) -> Result<Option<u64>, FrameError> {
        match self.state {
            ParseState::WaitingForHeader => {
                self.expected = decode_header(byte)?;
                self.received = 0;
                self.value = 0;
                self.state = ParseState::ReadingPayload;
                Ok(None)
            }
            ParseState::ReadingPayload => {
                self.value |= (byte as u64) << (8 * self.received);
                self.received += 1;
                if self.received < self.expected {
                    return Ok(None);
                }

                let value = self.value;
                self.reset();
                Ok(Some(value))
            }
        }
    }
}
