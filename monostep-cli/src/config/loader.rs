//! Configuration file loading

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use super::Config;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "monostep.toml";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load the tool configuration
///
/// An explicitly named file must exist. Without one, `monostep.toml` is
/// read if present and defaults are used otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_from(path, true),
        None => load_from(Path::new(DEFAULT_CONFIG_FILE), false),
    }
}

fn load_from(path: &Path, required: bool) -> Result<Config, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
            debug!("No {} found, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Loaded configuration from {}", path.display());
    log_config_summary(&config);
    Ok(config)
}

/// Parse configuration text
pub fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

fn log_config_summary(config: &Config) {
    let serial = &config.serial;
    debug!(
        "  Serial: {} @ {} baud, timeout {} ms",
        serial.device, serial.line.baud_rate, serial.timeout_ms
    );

    let motor = &config.motor;
    debug!(
        "  Motor: clock {} Hz, {} Hz default, microstep {}, control {:?}",
        motor.source_clock_hz, motor.frequency_hz, motor.microstep, motor.control_byte
    );

    let handshake = &config.handshake;
    match handshake.expected_ack {
        Some(ack) => debug!(
            "  Handshake: ack {:#04x}, {} attempt(s), settle {}/{} ms",
            ack, handshake.max_attempts, handshake.byte_settle_ms, handshake.frame_settle_ms
        ),
        None => debug!(
            "  Handshake: any ack, settle {}/{} ms",
            handshake.byte_settle_ms, handshake.frame_settle_ms
        ),
    }

    debug!("  Calibration: {}", config.calibration.file.display());
}
