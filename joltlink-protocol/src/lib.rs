//! Joltlink Command/Response Protocol
//!
//! This crate defines the byte-level protocol between the host and the
//! joltage solver peripheral. The host streams one command frame per
//! machine description and the peripheral answers each with one
//! length-prefixed integer, strictly in FIFO order.
//!
//! # Outbound frame (host → peripheral)
//!
//! ```text
//! ┌────────┬───────┬──────────────────┬──────────────────────────┐
//! │ START  │ COUNT │ BUTTONS          │ TARGETS                  │
//! │ 0x00   │ 1B    │ COUNT × u16 LE   │ MACHINE_COUNT × u16 LE   │
//! └────────┴───────┴──────────────────┴──────────────────────────┘
//! ```
//!
//! # Inbound frame (peripheral → host)
//!
//! ```text
//! ┌────────┬──────────────────────────┐
//! │ LENGTH │ VALUE                    │
//! │ 1..=8  │ LENGTH bytes, LSB first  │
//! └────────┴──────────────────────────┘
//! ```
//!
//! There is no checksum and no resynchronization marker on the inbound
//! side, so a lost byte desynchronizes the stream for good.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod error;
pub mod frame;
pub mod response;

pub use command::{button_mask, Command, MACHINE_COUNT, MAX_BUTTONS};
pub use error::FrameError;
pub use frame::{encode_command, CommandParser, MAX_FRAME_SIZE, START_MARKER};
pub use response::{
    decode_header, decode_payload, encode_response, ResponseParser, MAX_RESPONSE_BYTES,
    MAX_RESPONSE_FRAME_SIZE,
};
