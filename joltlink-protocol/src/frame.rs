//! Command frame encoding and decoding
//!
//! Frame format:
//! - START (1 byte): 0x00 marker
//! - COUNT (1 byte): number of buttons (0-255)
//! - BUTTONS (COUNT × 2 bytes): button bitmasks, little-endian
//! - TARGETS (MACHINE_COUNT × 2 bytes): target values, little-endian, zero-padded

use heapless::Vec;

use crate::command::{Command, MACHINE_COUNT, MAX_BUTTONS};

/// Frame start marker
pub const START_MARKER: u8 = 0x00;

/// Maximum complete frame size (START + COUNT + MAX_BUTTONS words + MACHINE_COUNT words)
pub const MAX_FRAME_SIZE: usize = 2 + 2 * MAX_BUTTONS + 2 * MACHINE_COUNT;

/// Encode a command into its wire frame
///
/// Never fails: the bounds are enforced when the [`Command`] is built.
pub fn encode_command(command: &Command) -> Vec<u8, MAX_FRAME_SIZE> {
    let mut frame = Vec::new();

    // Capacity is MAX_FRAME_SIZE and Command guarantees at most MAX_BUTTONS
    // buttons, so none of these pushes can fail.
    let _ = frame.push(START_MARKER);
    let _ = frame.push(command.buttons().len() as u8);
    for &button in command.buttons() {
        let _ = frame.extend_from_slice(&button.to_le_bytes());
    }
    for target in command.padded_targets() {
        let _ = frame.extend_from_slice(&target.to_le_bytes());
    }

    frame
}

impl Command {
    /// Encode this command into its wire frame
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        encode_command(self)
    }
}

/// Peripheral-side parser that rebuilds commands from the outbound byte stream
///
/// The host never needs this; it exists so the simulated peripheral and test
/// devices can consume exactly what the host sends.
#[derive(Debug, Clone)]
pub struct CommandParser {
    state: ParseState,
    button_count: u8,
    buttons: Vec<u16, MAX_BUTTONS>,
    targets: Vec<u16, MACHINE_COUNT>,
    low_byte: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for the START marker
    WaitingForStart,
    /// Got START, waiting for COUNT
    WaitingForCount,
    /// Reading button words
    ReadingButtons,
    /// Reading target words
    ReadingTargets,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Create a new command parser
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForStart,
            button_count: 0,
            buttons: Vec::new(),
            targets: Vec::new(),
            low_byte: None,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForStart;
        self.button_count = 0;
        self.buttons.clear();
        self.targets.clear();
        self.low_byte = None;
    }

    /// Whether the parser is between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForStart
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Some(command)` once the last target byte of a frame arrives.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        match self.state {
            ParseState::WaitingForStart => {
                // Silently ignore anything but the marker between frames
                if byte == START_MARKER {
                    self.state = ParseState::WaitingForCount;
                }
                None
            }
            ParseState::WaitingForCount => {
                self.button_count = byte;
                self.buttons.clear();
                self.targets.clear();
                self.low_byte = None;
                self.state = if byte == 0 {
                    ParseState::ReadingTargets
                } else {
                    ParseState::ReadingButtons
                };
                None
            }
            ParseState::ReadingButtons => {
                let word = self.take_word(byte)?;
                // Bounded by button_count <= MAX_BUTTONS
                let _ = self.buttons.push(word);
                if self.buttons.len() == self.button_count as usize {
                    self.state = ParseState::ReadingTargets;
                }
                None
            }
            ParseState::ReadingTargets => {
                let word = self.take_word(byte)?;
                let _ = self.targets.push(word);
                if self.targets.len() < MACHINE_COUNT {
                    return None;
                }

                let command = Command::new(&self.buttons, &self.targets).ok();
                self.reset();
                command
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete command found, if any.
    /// Remaining bytes after a complete command are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Option<Command> {
        bytes.iter().find_map(|&byte| self.feed(byte))
    }

    /// Pair up little-endian bytes into a word
    fn take_word(&mut self, byte: u8) -> Option<u16> {
        match self.low_byte.take() {
            Some(low) => Some(u16::from_le_bytes([low, byte])),
            None => {
                self.low_byte = Some(byte);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_two_buttons_two_targets() {
        let cmd = Command::new(&[0b0000000011, 0b0000000100], &[5, 12]).unwrap();
        let frame = encode_command(&cmd);

        let expected: [u8; 26] = [
            0x00, 0x02, // marker, count
            0x03, 0x00, 0x04, 0x00, // buttons
            0x05, 0x00, 0x0C, 0x00, // targets[0..2]
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // targets[2..6]
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // targets[6..10]
        ];
        assert_eq!(frame.len(), 26);
        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn test_encode_no_buttons() {
        let cmd = Command::new(&[], &[]).unwrap();
        let frame = cmd.encode();
        assert_eq!(frame.len(), 2 + 2 * MACHINE_COUNT);
        assert_eq!(frame[0], START_MARKER);
        assert_eq!(frame[1], 0);
        assert!(frame[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_max_buttons() {
        let buttons = [0x03FFu16; MAX_BUTTONS];
        let cmd = Command::new(&buttons, &[1; MACHINE_COUNT]).unwrap();
        let frame = cmd.encode();
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        assert_eq!(frame[1], 255);
        assert_eq!(&frame[2..4], &[0xFF, 0x03]);
    }

    #[test]
    fn test_parser_roundtrip() {
        let cmd = Command::new(&[0b11, 0b100], &[5, 12]).unwrap();
        let mut parser = CommandParser::new();
        let parsed = parser.feed_bytes(&cmd.encode()).unwrap();

        assert_eq!(parsed.buttons(), cmd.buttons());
        assert_eq!(parsed.padded_targets(), cmd.padded_targets());
        assert!(parser.is_idle());
    }

    #[test]
    fn test_parser_resync_after_garbage() {
        let cmd = Command::new(&[0x21], &[7]).unwrap();
        let mut data = std::vec![0x11, 0xFF, 0x42];
        data.extend_from_slice(&cmd.encode());

        let mut parser = CommandParser::new();
        let parsed = parser.feed_bytes(&data).unwrap();
        assert_eq!(parsed.buttons(), &[0x21]);
        assert_eq!(parsed.targets()[0], 7);
    }

    #[test]
    fn test_parser_back_to_back_frames() {
        let first = Command::new(&[1], &[2]).unwrap();
        let second = Command::new(&[4, 8], &[3, 3, 3]).unwrap();
        let mut stream = std::vec::Vec::new();
        stream.extend_from_slice(&first.encode());
        stream.extend_from_slice(&second.encode());

        let mut parser = CommandParser::new();
        let decoded: std::vec::Vec<Command> =
            stream.iter().filter_map(|&b| parser.feed(b)).collect();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].buttons(), first.buttons());
        assert_eq!(decoded[1].buttons(), second.buttons());
        assert_eq!(decoded[1].padded_targets(), second.padded_targets());
    }

    #[test]
    fn test_parser_incomplete_frame() {
        let cmd = Command::new(&[1, 2, 3], &[4]).unwrap();
        let frame = cmd.encode();
        let mut parser = CommandParser::new();
        assert_eq!(parser.feed_bytes(&frame[..frame.len() - 1]), None);
        assert!(!parser.is_idle());
        assert!(parser.feed(frame[frame.len() - 1]).is_some());
    }

    proptest! {
        #[test]
        fn prop_command_roundtrip(
            buttons in proptest::collection::vec(any::<u16>(), 0..=MAX_BUTTONS),
            targets in proptest::collection::vec(any::<u16>(), 0..=MACHINE_COUNT),
        ) {
            let cmd = Command::new(&buttons, &targets).unwrap();
            let frame = cmd.encode();
            prop_assert_eq!(frame.len(), 2 + 2 * buttons.len() + 2 * MACHINE_COUNT);

            let mut parser = CommandParser::new();
            let parsed = parser.feed_bytes(&frame).unwrap();
            prop_assert_eq!(parsed.buttons(), &buttons[..]);

            let mut padded = [0u16; MACHINE_COUNT];
            padded[..targets.len()].copy_from_slice(&targets);
            prop_assert_eq!(parsed.padded_targets(), padded);
        }
    }
}
