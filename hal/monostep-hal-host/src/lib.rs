//! Host implementation of the Monostep HAL
//!
//! Implements [`monostep_hal::UartTx`] and [`monostep_hal::UartRx`] on top
//! of an operating-system serial device, and [`embedded_hal::delay::DelayNs`]
//! on top of `std::thread::sleep`.

#![deny(unsafe_code)]

pub mod delay;
pub mod serial;

pub use delay::StdDelay;
pub use serial::{available_ports, PortDescription, SerialChannel, SerialError, SerialSettings};
