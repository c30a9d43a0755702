//! In-memory transport
//!
//! Two endpoints joined by a pair of bounded byte queues. Each endpoint
//! behaves like an open serial port: writes block when the far side is not
//! draining, reads give up after the configured timeout.

use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use joltlink_hal::{UartRx, UartTx};

/// Factory for connected in-memory endpoints
pub struct MemoryPort;

impl MemoryPort {
    /// Create two connected endpoints
    ///
    /// `capacity` bounds the bytes buffered in each direction.
    pub fn pair(capacity: usize, read_timeout: Duration) -> (PipeEnd, PipeEnd) {
        let (a_tx, b_rx) = bounded(capacity);
        let (b_tx, a_rx) = bounded(capacity);

        (
            PipeEnd {
                tx: PipeTx { queue: a_tx },
                rx: PipeRx {
                    queue: a_rx,
                    timeout: read_timeout,
                },
            },
            PipeEnd {
                tx: PipeTx { queue: b_tx },
                rx: PipeRx {
                    queue: b_rx,
                    timeout: read_timeout,
                },
            },
        )
    }
}

/// One side of a [`MemoryPort`] pair
pub struct PipeEnd {
    tx: PipeTx,
    rx: PipeRx,
}

impl PipeEnd {
    /// Separate the write and read halves
    pub fn split(self) -> (PipeTx, PipeRx) {
        (self.tx, self.rx)
    }
}

/// Write half of a [`PipeEnd`]
pub struct PipeTx {
    queue: Sender<u8>,
}

/// Read half of a [`PipeEnd`]
pub struct PipeRx {
    queue: Receiver<u8>,
    timeout: Duration,
}

impl UartTx for PipeTx {
    type Error = io::Error;

    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            self.queue
                .send(byte)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl UartRx for PipeRx {
    type Error = io::Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_for(buf, self.timeout)
    }

    fn read_blocking_within(&mut self, buf: &mut [u8], limit: Duration) -> io::Result<usize> {
        self.read_for(buf, limit.min(self.timeout))
    }
}

impl PipeRx {
    fn read_for(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.queue.recv_timeout(timeout) {
            Ok(byte) => buf[0] = byte,
            Err(RecvTimeoutError::Timeout) => return Ok(0),
            // A closed line reads as a silent one
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                return Ok(0);
            }
        }

        let mut filled = 1;
        while filled < buf.len() {
            match self.queue.try_recv() {
                Ok(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(filled)
    }
}

impl UartTx for PipeEnd {
    type Error = io::Error;

    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx.write_blocking(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tx.flush()
    }
}

impl UartRx for PipeEnd {
    type Error = io::Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rx.read_blocking(buf)
    }

    fn read_blocking_within(&mut self, buf: &mut [u8], limit: Duration) -> io::Result<usize> {
        self.rx.read_blocking_within(buf, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_bytes_cross_in_both_directions() {
        let (mut host, mut device) = MemoryPort::pair(16, TIMEOUT);

        host.write_blocking(&[1, 2, 3]).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(device.read_blocking(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        device.write_blocking(&[9]).unwrap();
        assert_eq!(host.read_byte().unwrap(), Some(9));
    }

    #[test]
    fn test_read_timeout_returns_zero() {
        let (_host, device) = MemoryPort::pair(4, TIMEOUT);
        let (_tx, mut rx) = device.split();
        assert_eq!(rx.read_byte().unwrap(), None);
    }

    #[test]
    fn test_read_within_shortens_timeout() {
        let (_host, device) = MemoryPort::pair(4, Duration::from_secs(3));
        let (_tx, mut rx) = device.split();

        let started = Instant::now();
        assert_eq!(rx.read_byte_within(Duration::from_millis(30)).unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_read_within_never_extends_timeout() {
        let (_host, device) = MemoryPort::pair(4, TIMEOUT);
        let (_tx, mut rx) = device.split();

        let started = Instant::now();
        assert_eq!(rx.read_byte_within(Duration::from_secs(3)).unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_closed_peer() {
        let (host, device) = MemoryPort::pair(4, TIMEOUT);
        let (mut tx, mut rx) = host.split();
        drop(device);

        assert_eq!(rx.read_byte().unwrap(), None);
        let err = tx.write_blocking(&[0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_buffered_bytes_survive_close() {
        let (mut host, device) = MemoryPort::pair(4, TIMEOUT);
        let (mut tx, _rx) = device.split();
        tx.write_blocking(&[7, 8]).unwrap();
        drop(tx);

        let mut buf = [0u8; 4];
        assert_eq!(host.read_blocking(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[7, 8]);
    }
}
