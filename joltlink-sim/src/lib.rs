//! Bit-level UART model for the joltlink peripheral
//!
//! Replaces the physical serial link and the FPGA with three cycle-stepped
//! state machines and a behavioral peripheral, so the wire protocol can be
//! exercised without hardware.
//!
//! ```text
//!  host side                        peripheral side
//! ┌─────────────┐   line (bits)   ┌──────────────────────────────┐
//! │ Transmitter │ ──────────────► │ Receiver → CommandParser     │
//! └─────────────┘                 │              │               │
//! ┌─────────────┐                 │          Responder           │
//! │ Receiver    │ ◄────────────── │              ▼               │
//! │  → Decoder  │   line (bits)   │ Transmitter ← encode_response│
//! └─────────────┘                 └──────────────────────────────┘
//! ```
//!
//! Every machine advances exactly once per rising clock edge. One UART bit
//! lasts [`timing::clocks_per_bit`] edges.

pub mod decoder;
pub mod harness;
pub mod peripheral;
pub mod receiver;
pub mod timing;
pub mod transmitter;

pub use decoder::Decoder;
pub use harness::{HarnessConfig, LoopbackHarness, SimError, SimReport};
pub use peripheral::{PeripheralConfig, Responder, SimulatedPeripheral, TargetSumResponder};
pub use receiver::{Receiver, RxState};
pub use timing::{baud_error_ppm, clocks_per_bit, TimingError};
pub use transmitter::{Transmitter, TxState};
