//! Stepper Controller Motion Protocol
//!
//! This crate defines the RS-232 protocol between the host and the
//! monochromator's stepper controller. A motion command is one fixed
//! five-byte frame:
//!
//! ```text
//! ┌────────────────┬────────────────┬─────────┐
//! │ FREQUENCY WORD │ STEP MAGNITUDE │ CONTROL │
//! │ 2B (BE)        │ 2B (BE)        │ 1B      │
//! └────────────────┴────────────────┴─────────┘
//! ```
//!
//! The frame is sent one byte at a time. The controller answers every
//! byte with an acknowledgment byte and the whole frame with a final
//! status byte.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod dump;
pub mod frame;
pub mod handshake;

pub use dump::HexDump;
pub use frame::{
    ControlByteMode, Direction, FrameError, FrameOptions, MotionFrame, MotionRequest, FRAME_LEN,
    SOURCE_CLOCK_HZ,
};
pub use handshake::{
    HandshakeConfig, HandshakeDriver, HandshakeError, HandshakeReport, HandshakeState, Nack,
    DEFAULT_ACK,
};
