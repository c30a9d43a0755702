//! Joltlink Hardware Abstraction Layer
//!
//! This crate defines the byte transport traits the protocol engine is
//! written against. Any channel that can "write a byte sequence, blocking
//! until accepted" and "read one byte, possibly timing out" can carry the
//! link: a real serial port or the in-memory pipe used by tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  joltlink-host (sender / reader)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  joltlink-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  serial port  │       │  memory pipe  │
//! │  (serialport) │       │  (crossbeam)  │
//! └───────────────┘       └───────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod uart;

pub use uart::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};
