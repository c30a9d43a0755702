//! UART serial communication abstractions
//!
//! The link is split in two halves so the sending role and the receiving
//! role can each own one without locking the transport.

use core::time::Duration;

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been accepted or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Blocks until at least one byte is available or the configured read
    /// timeout elapses. Returns `Ok(0)` on timeout.
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read data, giving up after `limit` if that is sooner than the
    /// configured read timeout
    ///
    /// Transports that cannot shorten a single read keep the configured
    /// timeout.
    fn read_blocking_within(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, Self::Error> {
        let _ = limit;
        self.read_blocking(buf)
    }

    /// Read a single byte from the UART
    ///
    /// Returns `Ok(None)` if the read timed out.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.read_blocking(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    /// Read a single byte, waiting no longer than `limit`
    fn read_byte_within(&mut self, limit: Duration) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.read_blocking_within(&mut buf, limit)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

impl<T: UartTx + ?Sized> UartTx for &mut T {
    type Error = T::Error;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_blocking(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}

impl<T: UartRx + ?Sized> UartRx for &mut T {
    type Error = T::Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read_blocking(buf)
    }

    fn read_blocking_within(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, Self::Error> {
        (**self).read_blocking_within(buf, limit)
    }
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Per-read timeout in deciseconds (termios `VTIME` units, max 255)
    pub read_timeout_ds: u8,
}

impl UartConfig {
    /// 8N1 configuration at the given baud rate
    pub const fn new(baudrate: u32, read_timeout_ds: u8) -> Self {
        Self {
            baudrate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ds,
        }
    }

    /// Read timeout in milliseconds
    pub const fn read_timeout_ms(&self) -> u32 {
        self.read_timeout_ds as u32 * 100
    }

    /// Number of line symbols per transferred byte (start + data + parity + stop)
    pub const fn bits_per_frame(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new(5_000_000, 255)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
