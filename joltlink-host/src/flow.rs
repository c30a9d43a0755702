//! Shared flow state
//!
//! The only state the sender and the reader share. Both counters are
//! running totals; `sent - acknowledged` is the number of commands the
//! peripheral is holding and must never exceed the window capacity.
//!
//! The sender sleeps on a condition variable while the window is full and
//! is woken by every acknowledgement, by cancellation, or by completion.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Returned to a waiter when the transfer has been cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Error)]
#[error("transfer cancelled")]
pub struct Cancelled;

/// Point-in-time copy of the window counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowSnapshot {
    /// Frames committed to the transport
    pub sent: u64,
    /// Responses fully decoded
    pub acknowledged: u64,
    /// Set once the sender has written its final frame
    pub total: Option<u64>,
    pub cancelled: bool,
}

impl FlowSnapshot {
    /// Commands sent but not yet answered
    pub fn in_flight(&self) -> u64 {
        self.sent - self.acknowledged
    }

    /// Every command sent and every answer decoded
    pub fn is_complete(&self) -> bool {
        self.total == Some(self.acknowledged)
    }
}

/// Bounded in-flight window shared by the sender and the reader
#[derive(Debug)]
pub struct FlowWindow {
    capacity: u64,
    state: Mutex<FlowSnapshot>,
    changed: Condvar,
}

impl FlowWindow {
    /// Create a window allowing `capacity` outstanding commands
    ///
    /// # Panics
    /// If `capacity` is zero, since no command could ever be sent.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "flow window capacity must be non-zero");
        Self {
            capacity: capacity as u64,
            state: Mutex::new(FlowSnapshot::default()),
            changed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Wait for room in the window and claim it for one more frame
    ///
    /// The capacity check and the increment happen under one guard. Returns
    /// the new running total of frames committed to the transport.
    pub fn acquire_slot(&self) -> Result<u64, Cancelled> {
        let mut state = self.state.lock();
        while !state.cancelled && state.in_flight() >= self.capacity {
            self.changed.wait(&mut state);
        }
        if state.cancelled {
            return Err(Cancelled);
        }
        state.sent += 1;
        let sent = state.sent;
        drop(state);
        self.changed.notify_all();
        Ok(sent)
    }

    /// Block while every sent command has been answered and more may follow
    ///
    /// Returns `Ok(true)` once a frame is outstanding or the sender has
    /// finished, `Ok(false)` if `timeout` elapses first.
    pub fn wait_for_outstanding(&self, timeout: Duration) -> Result<bool, Cancelled> {
        let until = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Err(Cancelled);
            }
            if state.total.is_some() || state.in_flight() > 0 {
                return Ok(true);
            }
            if Instant::now() >= until {
                return Ok(false);
            }
            self.changed.wait_until(&mut state, until);
        }
    }

    /// Record the running total of frames committed to the transport
    ///
    /// # Panics
    /// If the total goes backwards or the window would overflow. Either means
    /// the peripheral is about to be overrun.
    pub fn record_sent_total(&self, sent: u64) {
        let mut state = self.state.lock();
        assert!(
            sent >= state.sent,
            "sent total went backwards ({} -> {})",
            state.sent,
            sent
        );
        assert!(
            sent - state.acknowledged <= self.capacity,
            "flow window overrun: {} in flight, capacity {}",
            sent - state.acknowledged,
            self.capacity
        );
        state.sent = sent;
        drop(state);
        self.changed.notify_all();
    }

    /// Record the running total of decoded responses
    ///
    /// # Panics
    /// If more responses are recorded than commands were sent.
    pub fn record_acknowledged(&self, acknowledged: u64) {
        let mut state = self.state.lock();
        assert!(
            acknowledged <= state.sent,
            "acknowledged {} of only {} sent",
            acknowledged,
            state.sent
        );
        state.acknowledged = acknowledged.max(state.acknowledged);
        drop(state);
        self.changed.notify_all();
    }

    /// Mark the source exhausted after `total` frames
    ///
    /// Must be called only after the last frame has been written.
    pub fn mark_all_sent(&self, total: u64) {
        let mut state = self.state.lock();
        assert_eq!(total, state.sent, "final total disagrees with sent count");
        state.total = Some(total);
        drop(state);
        self.changed.notify_all();
    }

    /// Stop the transfer and wake any waiter
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.changed.notify_all();
    }

    pub fn in_flight(&self) -> u64 {
        self.state.lock().in_flight()
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().is_complete()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        *self.state.lock()
    }
}
