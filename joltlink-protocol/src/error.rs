//! Protocol error type

/// Errors that can occur while building, encoding, or decoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// More buttons than fit in the one-byte count field
    TooManyButtons,
    /// More targets than the peripheral has machines
    TooManyTargets,
    /// Response header declares a length outside `1..=8`
    InvalidLength(u8),
    /// Response payload ended before the declared length
    Truncated {
        /// Bytes declared by the header
        expected: u8,
        /// Bytes actually received
        received: u8,
    },
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::TooManyButtons => write!(f, "too many buttons for one frame"),
            FrameError::TooManyTargets => write!(f, "too many targets for one frame"),
            FrameError::InvalidLength(len) => {
                write!(f, "response header declares invalid length {len}")
            }
            FrameError::Truncated { expected, received } => write!(
                f,
                "response truncated: expected {expected} payload bytes, received {received}"
            ),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for FrameError {}
