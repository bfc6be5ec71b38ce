//! Monostep Hardware Abstraction Layer
//!
//! This crate defines the serial transport traits that the motion protocol
//! drives. The protocol crate never talks to an operating system directly;
//! it only needs something that can move single bytes in both directions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (monostep-cli)             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  monostep-protocol (frame + handshake)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  monostep-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!            ┌─────────────────┐
//!            │ monostep-hal-   │
//!            │      host       │
//!            └─────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication

#![no_std]
#![deny(unsafe_code)]

pub mod uart;

pub use uart::{DataBits, Parity, StopBits, Uart, UartConfig, UartRx, UartTx};
