//! Response reader
//!
//! Decodes one length-prefixed integer per command until every command the
//! sender wrote has been answered. A quiet line between responses is
//! normal; a quiet line inside a response is not.

use std::io;
use std::time::{Duration, Instant};

use joltlink_hal::UartRx;
use joltlink_protocol::{decode_header, decode_payload, FrameError, MAX_RESPONSE_BYTES};
use tracing::{info, trace, warn};

use crate::error::LinkError;
use crate::flow::FlowWindow;

/// How long an idle reader sleeps on the window before listening to the line
const IDLE_SLICE: Duration = Duration::from_millis(50);

/// Reads responses and releases window capacity as they arrive
pub struct ResponseReader<'w, R> {
    rx: R,
    window: &'w FlowWindow,
    deadline: Option<Duration>,
    expires: Option<Instant>,
}

impl<'w, R> ResponseReader<'w, R>
where
    R: UartRx<Error = io::Error>,
{
    pub fn new(rx: R, window: &'w FlowWindow) -> Self {
        Self {
            rx,
            window,
            deadline: None,
            expires: None,
        }
    }

    /// Give up if the whole transfer takes longer than `deadline`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Read a single response frame
    ///
    /// Returns [`LinkError::Timeout`] if no header byte arrives; the caller
    /// may simply try again. A timeout after the header is reported as a
    /// truncated frame, since the byte count can no longer be trusted.
    pub fn read_response(&mut self, index: usize) -> Result<u64, LinkError> {
        self.read_frame(index, None)
    }

    /// Read until every sent command has been answered
    ///
    /// Returns the decoded values in receipt order, which is command order.
    /// On error the window is cancelled so the sender stops too.
    pub fn run(mut self) -> Result<Vec<u64>, LinkError> {
        self.expires = self.deadline.map(|deadline| Instant::now() + deadline);
        let mut results = Vec::new();

        match self.read_all(&mut results) {
            Ok(()) => Ok(results),
            Err(e) => {
                self.window.cancel();
                Err(e)
            }
        }
    }

    fn read_all(&mut self, results: &mut Vec<u64>) -> Result<(), LinkError> {
        loop {
            let flow = self.window.snapshot();
            if flow.is_complete() {
                return Ok(());
            }
            if flow.cancelled {
                return Err(LinkError::Cancelled);
            }
            self.check_deadline()?;

            // Nothing is owed yet. Wait for the sender instead of a port
            // timeout, then listen briefly for anything the device volunteers.
            let idle = flow.total.is_none() && flow.in_flight() == 0;
            if idle && self.window.wait_for_outstanding(self.bounded(IDLE_SLICE))? {
                continue;
            }

            let index = results.len() + 1;
            let header_limit = idle.then_some(IDLE_SLICE);
            match self.read_frame(index, header_limit) {
                Ok(value) => {
                    // The sender records a frame before writing it, so an
                    // answer beyond the sent count came from nowhere.
                    let sent = self.window.snapshot().sent;
                    if index as u64 > sent {
                        return Err(LinkError::UnexpectedResponse { index, sent });
                    }
                    info!("{}: {}", index, value);
                    results.push(value);
                    self.window.record_acknowledged(index as u64);
                }
                Err(LinkError::Timeout) if idle => trace!("line idle"),
                Err(LinkError::Timeout) => {
                    warn!(
                        in_flight = self.window.in_flight(),
                        "timeout from UART, still waiting"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn read_frame(
        &mut self,
        index: usize,
        header_limit: Option<Duration>,
    ) -> Result<u64, LinkError> {
        let header = self.next_byte(header_limit)?.ok_or(LinkError::Timeout)?;
        let length = decode_header(header)
            .map_err(|source| LinkError::MalformedResponse { index, source })?;

        let mut payload = [0u8; MAX_RESPONSE_BYTES];
        for (received, slot) in payload[..length].iter_mut().enumerate() {
            match self.next_byte(None)? {
                Some(byte) => *slot = byte,
                None => {
                    self.check_deadline()?;
                    return Err(LinkError::MalformedResponse {
                        index,
                        source: FrameError::Truncated {
                            expected: length as u8,
                            received: received as u8,
                        },
                    });
                }
            }
        }

        decode_payload(&payload[..length], length)
            .map_err(|source| LinkError::MalformedResponse { index, source })
    }

    /// Read one byte, never waiting past `limit` or the deadline
    fn next_byte(&mut self, limit: Option<Duration>) -> io::Result<Option<u8>> {
        let limit = match (limit, self.remaining()) {
            (Some(limit), Some(left)) => Some(limit.min(left)),
            (limit, left) => limit.or(left),
        };
        match limit {
            Some(limit) => self.rx.read_byte_within(limit),
            None => self.rx.read_byte(),
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.expires
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }

    fn bounded(&self, wait: Duration) -> Duration {
        self.remaining().map_or(wait, |left| left.min(wait))
    }

    fn check_deadline(&self) -> Result<(), LinkError> {
        match (self.deadline, self.expires) {
            (Some(deadline), Some(expires)) if Instant::now() >= expires => {
                Err(LinkError::DeadlineExceeded(deadline))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a script where `None` is a read timeout
    struct Script(VecDeque<Option<u8>>);

    impl Script {
        fn new(items: &[Option<u8>]) -> Self {
            Self(items.iter().copied().collect())
        }

        fn bytes(bytes: &[u8]) -> Self {
            Self(bytes.iter().map(|&b| Some(b)).collect())
        }
    }

    impl UartRx for Script {
        type Error = io::Error;

        fn read_blocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front().flatten() {
                Some(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    fn sent_window(capacity: usize, sent: u64, all_sent: bool) -> FlowWindow {
        let window = FlowWindow::new(capacity);
        window.record_sent_total(sent);
        if all_sent {
            window.mark_all_sent(sent);
        }
        window
    }

    #[test]
    fn test_reads_concrete_response() {
        let window = sent_window(1, 1, true);
        let mut reader = ResponseReader::new(Script::bytes(&[0x03, 0x2A, 0x01, 0x00]), &window);
        assert_eq!(reader.read_response(1).unwrap(), 298);
    }

    #[test]
    fn test_run_collects_in_order() {
        let window = sent_window(3, 3, true);
        let rx = Script::bytes(&[1, 7, 2, 0x00, 0x01, 1, 0]);
        let results = ResponseReader::new(rx, &window).run().unwrap();
        assert_eq!(results, vec![7, 256, 0]);
        assert!(window.is_complete());
    }

    #[test]
    fn test_header_timeout_is_retried() {
        let window = sent_window(2, 2, true);
        let rx = Script::new(&[None, Some(1), Some(4), None, None, Some(1), Some(5)]);
        let results = ResponseReader::new(rx, &window).run().unwrap();
        assert_eq!(results, vec![4, 5]);
    }

    #[test]
    fn test_header_timeout_reported() {
        let window = sent_window(1, 1, true);
        let mut reader = ResponseReader::new(Script::new(&[None]), &window);
        assert!(matches!(reader.read_response(1), Err(LinkError::Timeout)));
    }

    #[test]
    fn test_mid_frame_timeout_is_malformed() {
        let window = sent_window(1, 1, true);
        let rx = Script::new(&[Some(4), Some(0xAA), None]);
        let err = ResponseReader::new(rx, &window).run().unwrap_err();
        assert!(matches!(
            err,
            LinkError::MalformedResponse {
                index: 1,
                source: FrameError::Truncated {
                    expected: 4,
                    received: 1
                }
            }
        ));
        assert!(window.is_cancelled());
    }

    #[test]
    fn test_invalid_header_is_malformed() {
        for header in [0u8, 9, 255] {
            let window = sent_window(1, 1, true);
            let err = ResponseReader::new(Script::bytes(&[header, 1, 2]), &window)
                .run()
                .unwrap_err();
            assert!(matches!(
                err,
                LinkError::MalformedResponse {
                    source: FrameError::InvalidLength(h),
                    ..
                } if h == header
            ));
        }
    }

    #[test]
    fn test_unexpected_response() {
        let window = sent_window(2, 1, false);
        let rx = Script::bytes(&[1, 1, 1, 2]);
        let err = ResponseReader::new(rx, &window).run().unwrap_err();
        assert!(matches!(
            err,
            LinkError::UnexpectedResponse { index: 2, sent: 1 }
        ));
    }

    #[test]
    fn test_idle_reader_finishes_when_sender_does() {
        let window = sent_window(2, 1, false);
        let rx = Script::bytes(&[1, 4]);

        let results = std::thread::scope(|s| {
            let reader = s.spawn(|| ResponseReader::new(rx, &window).run());
            std::thread::sleep(Duration::from_millis(30));
            window.mark_all_sent(1);
            reader.join().unwrap()
        });

        assert_eq!(results.unwrap(), vec![4]);
        assert!(window.is_complete());
    }

    #[test]
    fn test_deadline() {
        let window = sent_window(1, 1, true);
        let rx = Script::new(&[None; 64]);
        let err = ResponseReader::new(rx, &window)
            .with_deadline(Some(Duration::ZERO))
            .run();
        match err {
            Err(LinkError::DeadlineExceeded(d)) => assert_eq!(d, Duration::ZERO),
            other => panic!("expected deadline error, got {other:?}"),
        }
    }

    #[test]
    fn test_stops_when_cancelled() {
        let window = sent_window(1, 1, false);
        window.cancel();
        let err = ResponseReader::new(Script::new(&[]), &window)
            .run()
            .unwrap_err();
        assert!(matches!(err, LinkError::Cancelled));
    }
}
