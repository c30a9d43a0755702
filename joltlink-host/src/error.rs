//! Link error type

use std::convert::Infallible;
use std::io;
use std::time::Duration;

use joltlink_protocol::FrameError;
use thiserror::Error;

use crate::flow::Cancelled;
use crate::source::ParseError;

/// Errors that end a transfer
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened or configured
    #[error("failed to open {port}: {source}")]
    Setup {
        port: String,
        #[source]
        source: serialport::Error,
    },
    /// Reading or writing the transport failed
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// No header byte arrived within the read timeout
    ///
    /// Retryable: the reader logs it and keeps waiting.
    #[error("timed out waiting for a response header")]
    Timeout,
    /// A response frame was invalid or cut short
    #[error("malformed response #{index}: {source}")]
    MalformedResponse {
        index: usize,
        #[source]
        source: FrameError,
    },
    /// The peripheral answered more commands than were sent
    #[error("unexpected response #{index}: only {sent} command(s) sent")]
    UnexpectedResponse { index: usize, sent: u64 },
    /// The command source produced an invalid command
    #[error(transparent)]
    Source(#[from] ParseError),
    /// The overall transfer deadline passed
    #[error("transfer deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    /// The other role stopped the transfer
    #[error("transfer cancelled")]
    Cancelled,
}

impl From<Cancelled> for LinkError {
    fn from(_: Cancelled) -> Self {
        LinkError::Cancelled
    }
}

impl From<Infallible> for LinkError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}
