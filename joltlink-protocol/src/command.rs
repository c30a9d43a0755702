//! Command definition
//!
//! A command describes one machine: the buttons that can be pressed, each
//! as a bitmask of the counters it increments, and the per-counter target
//! values the peripheral has to reach.

use heapless::Vec;

use crate::error::FrameError;

/// Number of counter channels on the peripheral
///
/// Every frame carries exactly this many target slots.
pub const MACHINE_COUNT: usize = 10;

/// Maximum buttons per command (limited by the one-byte count field)
pub const MAX_BUTTONS: usize = u8::MAX as usize;

/// Build a button bitmask from the counter indices it affects
///
/// Returns `None` if any index is not a valid counter.
pub fn button_mask(digits: &[u8]) -> Option<u16> {
    digits.iter().try_fold(0u16, |mask, &digit| {
        if (digit as usize) < MACHINE_COUNT {
            Some(mask | (1 << digit))
        } else {
            None
        }
    })
}

/// A single machine description, ready to be framed
///
/// Immutable once built. The constructor enforces the bounds that make
/// encoding infallible.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    buttons: Vec<u16, MAX_BUTTONS>,
    targets: Vec<u16, MACHINE_COUNT>,
}

impl Command {
    /// Create a command from button bitmasks and target values
    pub fn new(buttons: &[u16], targets: &[u16]) -> Result<Self, FrameError> {
        let buttons = Vec::from_slice(buttons).map_err(|_| FrameError::TooManyButtons)?;
        let targets = Vec::from_slice(targets).map_err(|_| FrameError::TooManyTargets)?;
        Ok(Self { buttons, targets })
    }

    /// Button bitmasks in input order
    pub fn buttons(&self) -> &[u16] {
        &self.buttons
    }

    /// Target values as given (may be shorter than [`MACHINE_COUNT`])
    pub fn targets(&self) -> &[u16] {
        &self.targets
    }

    /// Target values zero-padded to [`MACHINE_COUNT`] slots, as sent on the wire
    pub fn padded_targets(&self) -> [u16; MACHINE_COUNT] {
        let mut padded = [0u16; MACHINE_COUNT];
        padded[..self.targets.len()].copy_from_slice(&self.targets);
        padded
    }

    /// Size of the encoded frame in bytes
    pub fn frame_len(&self) -> usize {
        2 + 2 * self.buttons.len() + 2 * MACHINE_COUNT
    }
}
