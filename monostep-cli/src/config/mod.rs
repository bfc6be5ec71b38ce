//! Tool configuration
//!
//! Loaded from a TOML file (`monostep.toml` by default). Every section and
//! every key is optional; command-line flags override what the file says.

pub mod loader;

use std::path::PathBuf;

use monostep_hal_host::SerialSettings;
use monostep_protocol::{ControlByteMode, FrameOptions, HandshakeConfig, SOURCE_CLOCK_HZ};
use serde::Deserialize;

pub use loader::load_config;

/// Complete tool configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialSettings,
    pub motor: MotorConfig,
    pub handshake: HandshakeConfig,
    pub calibration: CalibrationConfig,
}

/// Stepper controller and move defaults
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Step timer source clock of the controller
    pub source_clock_hz: u32,
    /// Control byte policy
    pub control_byte: ControlByteMode,
    /// Step rate used when a command does not give one
    pub frequency_hz: u32,
    /// Microstep unless a command says otherwise
    pub microstep: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            source_clock_hz: SOURCE_CLOCK_HZ,
            control_byte: ControlByteMode::Literal,
            frequency_hz: 3200,
            microstep: false,
        }
    }
}

impl MotorConfig {
    pub fn frame_options(&self) -> FrameOptions {
        FrameOptions {
            source_clock_hz: self.source_clock_hz,
            control: self.control_byte,
        }
    }
}

/// Calibration table location
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub file: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("calibration.txt"),
        }
    }
}
