//! Serial device transport
//!
//! [`SerialChannel`] owns an open device for its whole lifetime. Both
//! buffers are cleared right after the line settings are applied and
//! again on [`SerialChannel::close`].

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, warn};
use monostep_hal::uart::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, FlowControl, SerialPort, SerialPortType};
use thiserror::Error;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Errors raised by the serial transport
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("cannot open serial device {device}")]
    Open {
        device: String,
        #[source]
        source: serialport::Error,
    },

    #[error("cannot configure serial device {device}")]
    Configure {
        device: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O failed")]
    Io(#[source] io::Error),

    #[error("no reply from the device within the read timeout")]
    Timeout,
}

impl From<io::Error> for SerialError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SerialError::Timeout,
            _ => SerialError::Io(err),
        }
    }
}

/// Which device to open and how to drive its line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyS2` or `COM3`
    pub device: String,
    #[serde(flatten)]
    pub line: UartConfig,
    /// How long a read may wait for the device, in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: String::from("/dev/ttyS2"),
            line: UartConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn to_serialport_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn to_serialport_stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// Sort a failed open into "device missing" and "device refused the settings"
fn open_error(device: &str, source: serialport::Error) -> SerialError {
    let device = device.to_string();
    match source.kind() {
        serialport::ErrorKind::InvalidInput => SerialError::Configure { device, source },
        _ => SerialError::Open { device, source },
    }
}

/// An open, configured serial device
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    settings: SerialSettings,
}

impl SerialChannel {
    /// Open and configure a device
    ///
    /// Raw mode, no flow control, line settings from `settings`. Pending
    /// input and output are discarded before the channel is returned.
    pub fn open(settings: &SerialSettings) -> Result<Self, SerialError> {
        let line = &settings.line;
        let port = serialport::new(settings.device.as_str(), line.baud_rate)
            .data_bits(to_serialport_data_bits(line.data_bits))
            .parity(to_serialport_parity(line.parity))
            .stop_bits(to_serialport_stop_bits(line.stop_bits))
            .flow_control(FlowControl::None)
            .timeout(settings.timeout())
            .open()
            .map_err(|e| open_error(&settings.device, e))?;

        port.clear(ClearBuffer::All)
            .map_err(|source| SerialError::Configure {
                device: settings.device.clone(),
                source,
            })?;

        debug!(
            "opened {} at {} baud ({:?}, {:?} parity, {:?} stop), timeout {} ms",
            settings.device,
            line.baud_rate,
            line.data_bits,
            line.parity,
            line.stop_bits,
            settings.timeout_ms
        );

        Ok(Self {
            port: Some(port),
            settings: settings.clone(),
        })
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Drain output, clear both buffers and release the device
    pub fn close(mut self) -> Result<(), SerialError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), SerialError> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };

        port.flush()?;
        port.clear(ClearBuffer::All)
            .map_err(|source| SerialError::Configure {
                device: self.settings.device.clone(),
                source,
            })?;
        debug!("closed {}", self.settings.device);
        Ok(())
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial channel closed"))
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("closing {}: {}", self.settings.device, e);
        }
    }
}

impl UartTx for SerialChannel {
    type Error = SerialError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.port()?.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        self.port()?.flush()?;
        Ok(())
    }
}

impl UartRx for SerialChannel {
    type Error = SerialError;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.port()?.read_exact(buf)?;
        Ok(buf.len())
    }
}

/// A serial device reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    pub name: String,
    pub kind: String,
}

/// List the serial devices the operating system knows about
pub fn available_ports() -> Result<Vec<PortDescription>, SerialError> {
    let ports = serialport::available_ports().map_err(|source| SerialError::Open {
        device: String::from("<enumerate>"),
        source,
    })?;

    Ok(ports
        .into_iter()
        .map(|port| PortDescription {
            kind: describe_port_type(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut kind = format!("USB {:04x}:{:04x}", info.vid, info.pid);
            if let Some(product) = &info.product {
                kind.push(' ');
                kind.push_str(product);
            }
            kind
        }
        SerialPortType::BluetoothPort => String::from("Bluetooth"),
        SerialPortType::PciPort => String::from("PCI"),
        SerialPortType::Unknown => String::from("Unknown"),
    }
}
