//! Host side of the joltlink command/response link
//!
//! Streams parsed commands to the peripheral from one thread while a second
//! thread decodes the answers, with a shared window bounding how many
//! commands may be outstanding at once:
//!
//! - [`flow`] - shared window state coupling sender and reader
//! - [`sender`] - flow-controlled frame writer
//! - [`reader`] - response decoder loop
//! - [`transfer`] - runs both roles for one input
//! - [`port`], [`pipe`] - real and in-memory transports
//! - [`source`] - text command parser feeding the sender
//! - [`config`] - TOML configuration
//! - [`telemetry`] - log subscriber setup for the binary

pub mod config;
pub mod error;
pub mod flow;
pub mod pipe;
pub mod port;
pub mod reader;
pub mod sender;
pub mod source;
pub mod telemetry;
pub mod transfer;

pub use config::Config;
pub use error::LinkError;
pub use flow::{Cancelled, FlowSnapshot, FlowWindow};
pub use reader::ResponseReader;
pub use sender::FlowSender;
pub use source::{parse_line, CommandSource, ParseError};
pub use transfer::{TransferConfig, TransferReport};
