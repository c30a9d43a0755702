//! Configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) describes the stock setup:
//!
//! ```toml
//! [link]
//! port = "/dev/ttyUSB1"
//! baud_rate = 5000000
//! timeout_ds = 255
//!
//! [flow]
//! window = 200
//! # deadline_secs = 600
//!
//! [input]
//! path = "data/input.txt"
//!
//! [sim]
//! clock_hz = 100000000
//! latency_cycles = 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use joltlink_hal::UartConfig;
use joltlink_sim::{HarnessConfig, PeripheralConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::transfer::TransferConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub link: LinkConfig,
    pub flow: FlowConfig,
    pub input: InputConfig,
    pub sim: SimConfig,
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Device path
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout in deciseconds
    pub timeout_ds: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let uart = UartConfig::default();
        Self {
            port: "/dev/ttyUSB1".into(),
            baud_rate: uart.baudrate,
            timeout_ds: uart.read_timeout_ds,
        }
    }
}

impl LinkConfig {
    /// 8N1 line settings for this link
    pub fn uart(&self) -> UartConfig {
        UartConfig::new(self.baud_rate, self.timeout_ds)
    }
}

/// Flow control settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    /// Commands the peripheral can hold at once
    pub window: usize,
    /// Give up on a transfer after this many seconds
    pub deadline_secs: Option<u64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window: 200,
            deadline_secs: None,
        }
    }
}

impl FlowConfig {
    pub fn transfer(&self) -> TransferConfig {
        TransferConfig {
            window: self.window,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/input.txt"),
        }
    }
}

/// Bit-level simulation settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Simulated system clock
    pub clock_hz: u32,
    /// Cycles the peripheral spends on each command before answering
    pub latency_cycles: u64,
    /// Cycle budget for a whole run
    pub max_cycles: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let harness = HarnessConfig::default();
        Self {
            clock_hz: harness.clock_hz,
            latency_cycles: harness.peripheral.latency_cycles,
            max_cycles: harness.max_cycles,
        }
    }
}

impl Config {
    /// Load from `path`, or return defaults when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.baud_rate == 0 {
            return Err(ConfigError::Zero("link.baud_rate"));
        }
        if self.flow.window == 0 {
            return Err(ConfigError::Zero("flow.window"));
        }
        if self.sim.clock_hz == 0 {
            return Err(ConfigError::Zero("sim.clock_hz"));
        }
        Ok(())
    }

    /// Harness settings for simulating this link
    pub fn harness(&self) -> HarnessConfig {
        HarnessConfig {
            clock_hz: self.sim.clock_hz,
            baud_rate: self.link.baud_rate,
            window: self.flow.window,
            max_cycles: self.sim.max_cycles,
            peripheral: PeripheralConfig {
                capacity: self.flow.window,
                latency_cycles: self.sim.latency_cycles,
            },
            ..HarnessConfig::default()
        }
    }
}
