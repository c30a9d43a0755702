//! Serial port transport

use std::io::{self, Read, Write};
use std::time::Duration;

use joltlink_hal::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};
use serialport::{FlowControl, SerialPort};
use tracing::info;

use crate::config::LinkConfig;
use crate::error::LinkError;

/// Open the configured device and split it into write and read halves
///
/// The line is configured raw: no flow control, framing taken from
/// [`LinkConfig::uart`].
pub fn open(link: &LinkConfig) -> Result<(SerialTx, SerialRx), LinkError> {
    let uart = link.uart();
    let setup = |source| LinkError::Setup {
        port: link.port.clone(),
        source,
    };

    let port = serialport::new(&link.port, uart.baudrate)
        .data_bits(data_bits(&uart))
        .parity(parity(&uart))
        .stop_bits(stop_bits(&uart))
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(uart.read_timeout_ms() as u64))
        .open()
        .map_err(setup)?;
    let reader = port.try_clone().map_err(setup)?;

    info!(
        port = %link.port,
        baud = uart.baudrate,
        timeout_ms = uart.read_timeout_ms(),
        "serial port open"
    );

    Ok((SerialTx { port }, SerialRx { port: reader }))
}

fn data_bits(uart: &UartConfig) -> serialport::DataBits {
    match uart.data_bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(uart: &UartConfig) -> serialport::Parity {
    match uart.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn stop_bits(uart: &UartConfig) -> serialport::StopBits {
    match uart.stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// Write half of an open serial port
pub struct SerialTx {
    port: Box<dyn SerialPort>,
}

/// Read half of an open serial port
pub struct SerialRx {
    port: Box<dyn SerialPort>,
}

impl UartTx for SerialTx {
    type Error = io::Error;

    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl UartRx for SerialRx {
    type Error = io::Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            other => other,
        }
    }

    fn read_blocking_within(&mut self, buf: &mut [u8], limit: Duration) -> io::Result<usize> {
        let configured = self.port.timeout();
        if limit >= configured {
            return self.read_blocking(buf);
        }

        self.port.set_timeout(limit)?;
        let read = self.read_blocking(buf);
        self.port.set_timeout(configured)?;
        read
    }
}
