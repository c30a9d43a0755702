//! Clock and baud rate arithmetic
//!
//! The bit period is `clock_hz / baud_rate` edges, truncated. The remainder
//! is not compensated, so the simulated line runs slightly faster than the
//! nominal baud rate whenever the division is inexact. [`baud_error_ppm`]
//! reports how far off it is.

use thiserror::Error;

/// Smallest bit period the receiver can sample at a midpoint
pub const MIN_CLOCKS_PER_BIT: u32 = 2;

/// Invalid clock/baud combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("baud rate must be non-zero")]
    ZeroBaudRate,
    #[error("{clock_hz} Hz clock gives {clocks_per_bit} clocks per bit at {baud_rate} baud (need at least 2)")]
    TooFewClocksPerBit {
        clock_hz: u32,
        baud_rate: u32,
        clocks_per_bit: u32,
    },
}

/// Number of clock edges per UART bit
pub fn clocks_per_bit(clock_hz: u32, baud_rate: u32) -> Result<u32, TimingError> {
    if baud_rate == 0 {
        return Err(TimingError::ZeroBaudRate);
    }

    let clocks_per_bit = clock_hz / baud_rate;
    if clocks_per_bit < MIN_CLOCKS_PER_BIT {
        return Err(TimingError::TooFewClocksPerBit {
            clock_hz,
            baud_rate,
            clocks_per_bit,
        });
    }
    Ok(clocks_per_bit)
}

/// Deviation of the effective baud rate from the nominal one, in parts per million
///
/// Positive means the simulated line is faster than requested.
pub fn baud_error_ppm(clock_hz: u32, baud_rate: u32) -> Result<i64, TimingError> {
    let cpb = clocks_per_bit(clock_hz, baud_rate)? as i64;
    let nominal = baud_rate as i64;
    // effective = clock_hz / cpb; error = (effective - nominal) / nominal
    let effective_x1m = clock_hz as i64 * 1_000_000 / cpb;
    Ok((effective_x1m - nominal * 1_000_000) / nominal)
}
