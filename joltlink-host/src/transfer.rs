//! One complete transfer
//!
//! Runs the sender and the reader side by side on their own threads, both
//! borrowing a single [`FlowWindow`], and joins them once the window reports
//! completion or either side fails.

use std::io;
use std::panic;
use std::thread;
use std::time::{Duration, Instant};

use joltlink_hal::{UartRx, UartTx};
use joltlink_protocol::Command;
use tracing::info;

use crate::error::LinkError;
use crate::flow::FlowWindow;
use crate::reader::ResponseReader;
use crate::sender::FlowSender;

/// Transfer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Commands allowed in flight
    pub window: usize,
    /// Overall time limit, none by default
    pub deadline: Option<Duration>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            window: 200,
            deadline: None,
        }
    }
}

/// Outcome of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Decoded values, index `k` answering the `k`-th command
    pub results: Vec<u64>,
    pub frames_sent: u64,
    pub elapsed: Duration,
}

impl TransferReport {
    /// Sum of all decoded values
    pub fn sum(&self) -> u64 {
        self.results.iter().sum()
    }
}

/// Stream `commands` over the link and collect every answer
///
/// When one side fails the other is cancelled, and the error that caused
/// the stop is returned rather than the resulting [`LinkError::Cancelled`].
pub fn run<T, R, I, E>(
    tx: T,
    rx: R,
    commands: I,
    config: &TransferConfig,
) -> Result<TransferReport, LinkError>
where
    T: UartTx<Error = io::Error> + Send,
    R: UartRx<Error = io::Error> + Send,
    I: IntoIterator<Item = Result<Command, E>>,
    I::IntoIter: Send,
    E: Into<LinkError>,
{
    let window = FlowWindow::new(config.window);
    let commands = commands.into_iter();
    let started = Instant::now();

    let (sent, received) = thread::scope(|s| {
        let sender = s.spawn(|| FlowSender::new(tx, &window).run(commands));
        let reader = s.spawn(|| {
            ResponseReader::new(rx, &window)
                .with_deadline(config.deadline)
                .run()
        });
        (join(sender.join()), join(reader.join()))
    });

    let (frames_sent, results) = match (sent, received) {
        (Ok(frames_sent), Ok(results)) => (frames_sent, results),
        (Err(LinkError::Cancelled), Err(e)) | (Err(e), _) | (_, Err(e)) => return Err(e),
    };

    let elapsed = started.elapsed();
    info!(
        frames = frames_sent,
        elapsed_us = elapsed.as_micros() as u64,
        "transfer complete"
    );

    Ok(TransferReport {
        results,
        frames_sent,
        elapsed,
    })
}

/// Re-raise a role's panic on the calling thread
fn join<T>(result: thread::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::MemoryPort;
    use joltlink_protocol::{encode_response, CommandParser};
    use std::convert::Infallible;

    const TIMEOUT: Duration = Duration::from_millis(20);

    /// Answer every command with the sum of its targets
    fn echo_device(port: crate::pipe::PipeEnd, expected: usize) {
        let (mut tx, mut rx) = port.split();
        let mut parser = CommandParser::new();
        let mut answered = 0;
        let mut buf = [0u8; 64];
        while answered < expected {
            let n = rx.read_blocking(&mut buf).unwrap();
            for &byte in &buf[..n] {
                if let Some(command) = parser.feed(byte) {
                    let value = command.targets().iter().map(|&t| t as u64).sum();
                    tx.write_blocking(&encode_response(value)).unwrap();
                    answered += 1;
                }
            }
        }
    }

    #[test]
    fn test_round_trip_over_pipe() {
        let (host, device) = MemoryPort::pair(256, TIMEOUT);
        let (tx, rx) = host.split();
        let commands: Vec<Command> = (1..=20u16)
            .map(|i| Command::new(&[0b1], &[i, 1000]).unwrap())
            .collect();

        let report = thread::scope(|s| {
            s.spawn(|| echo_device(device, 20));
            run(
                tx,
                rx,
                commands.into_iter().map(Ok::<_, Infallible>),
                &TransferConfig {
                    window: 3,
                    deadline: Some(Duration::from_secs(10)),
                },
            )
            .unwrap()
        });

        assert_eq!(report.frames_sent, 20);
        let expected: Vec<u64> = (1..=20u64).map(|i| i + 1000).collect();
        assert_eq!(report.results, expected);
        assert_eq!(report.sum(), expected.iter().sum::<u64>());
    }

    #[test]
    fn test_empty_input() {
        let (host, _device) = MemoryPort::pair(4, TIMEOUT);
        let (tx, rx) = host.split();
        let report = run(
            tx,
            rx,
            std::iter::empty::<Result<Command, Infallible>>(),
            &TransferConfig::default(),
        )
        .unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.frames_sent, 0);
    }

    /// Transmitter whose flush waits like a real port draining its buffer
    struct SlowFlush<T>(T);

    impl<T: UartTx<Error = io::Error>> UartTx for SlowFlush<T> {
        type Error = io::Error;

        fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
            self.0.write_blocking(data)
        }

        fn flush(&mut self) -> io::Result<()> {
            thread::sleep(Duration::from_millis(50));
            self.0.flush()
        }
    }

    #[test]
    fn test_slow_flush_does_not_stall_reader() {
        let (host, device) = MemoryPort::pair(64, Duration::from_secs(3));
        let (tx, rx) = host.split();
        let command = Command::new(&[1], &[7]).unwrap();

        let report = thread::scope(|s| {
            s.spawn(|| echo_device(device, 1));
            run(
                SlowFlush(tx),
                rx,
                [Ok::<_, Infallible>(command)],
                &TransferConfig::default(),
            )
            .unwrap()
        });

        assert_eq!(report.results, vec![7]);
        assert!(
            report.elapsed < Duration::from_secs(1),
            "reader waited out the port timeout: {:?}",
            report.elapsed
        );
    }

    #[test]
    fn test_deadline_cuts_long_port_timeout() {
        let (host, _device) = MemoryPort::pair(1024, Duration::from_secs(3));
        let (tx, rx) = host.split();
        let commands = vec![Ok::<_, Infallible>(Command::new(&[1], &[1]).unwrap()); 5];
        let started = Instant::now();

        let err = run(
            tx,
            rx,
            commands,
            &TransferConfig {
                window: 2,
                deadline: Some(Duration::from_millis(100)),
            },
        )
        .unwrap_err();

        assert!(matches!(err, LinkError::DeadlineExceeded(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_silent_device_hits_deadline() {
        let (host, _device) = MemoryPort::pair(1024, TIMEOUT);
        let (tx, rx) = host.split();
        let commands = vec![Ok::<_, Infallible>(Command::new(&[1], &[1]).unwrap()); 5];

        let err = run(
            tx,
            rx,
            commands,
            &TransferConfig {
                window: 2,
                deadline: Some(Duration::from_millis(100)),
            },
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::DeadlineExceeded(_)));
    }
}
