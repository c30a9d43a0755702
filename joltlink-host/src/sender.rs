//! Flow-controlled sender
//!
//! Drains the command source onto the transport, never letting more than the
//! window capacity of commands be outstanding. Frames leave in source order.

use std::io;

use joltlink_hal::UartTx;
use joltlink_protocol::Command;
use tracing::{debug, trace};

use crate::error::LinkError;
use crate::flow::FlowWindow;

/// Writes one frame per command, throttled by the shared window
pub struct FlowSender<'w, T> {
    tx: T,
    window: &'w FlowWindow,
}

impl<'w, T> FlowSender<'w, T>
where
    T: UartTx<Error = io::Error>,
{
    pub fn new(tx: T, window: &'w FlowWindow) -> Self {
        Self { tx, window }
    }

    /// Send every command and return the number of frames written
    ///
    /// The window is marked complete only after the last frame has been
    /// handed to the transport. On any error the window is cancelled so the
    /// reader stops too.
    pub fn run<I, E>(mut self, commands: I) -> Result<u64, LinkError>
    where
        I: IntoIterator<Item = Result<Command, E>>,
        E: Into<LinkError>,
    {
        match self.send_all(commands) {
            Ok(total) => {
                self.window.mark_all_sent(total);
                debug!(total, "all commands sent");
                Ok(total)
            }
            Err(e) => {
                self.window.cancel();
                Err(e)
            }
        }
    }

    fn send_all<I, E>(&mut self, commands: I) -> Result<u64, LinkError>
    where
        I: IntoIterator<Item = Result<Command, E>>,
        E: Into<LinkError>,
    {
        let mut sent = 0u64;

        for command in commands {
            let command = command.map_err(Into::into)?;

            // Count the frame before writing it, so a fast answer can never be
            // decoded ahead of its own send being recorded.
            sent = self.window.acquire_slot()?;

            let frame = command.encode();
            trace!(index = sent, len = frame.len(), "sending frame");
            self.tx.write_blocking(&frame)?;
        }

        self.tx.flush()?;
        Ok(sent)
    }
}
