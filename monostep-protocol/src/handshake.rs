//! Byte-by-byte handshake driver
//!
//! The controller has no receive buffer to speak of, so the host sends one
//! byte, waits for it to be processed and reads back one acknowledgment
//! before sending the next. After the last byte the controller reports a
//! single status byte.
//!
//! ```text
//! Idle ──▶ Transmitting(0) ──▶ … ──▶ Transmitting(4) ──▶ AwaitingFinalStatus ──▶ Done
//!              │                           │                     │
//!              └───────── I/O error ───────┴─────────────────────┴──▶ Failed
//! ```
//!
//! When an expected acknowledgment byte is configured, any other byte
//! aborts the attempt and the whole frame is sent again from byte 0, up
//! to `max_attempts` times. I/O errors are never retried.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use monostep_hal::uart::{UartRx, UartTx};

use crate::frame::{MotionFrame, FRAME_LEN};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Acknowledgment byte the controller sends for an accepted byte
pub const DEFAULT_ACK: u8 = 0xFA;

/// Upper bound on attempts per frame
pub const MAX_ATTEMPTS: usize = 8;

/// Handshake timing and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HandshakeConfig {
    /// Pause between writing a byte and reading its acknowledgment
    pub byte_settle_ms: u32,
    /// Pause between the last acknowledgment and the status byte
    pub frame_settle_ms: u32,
    /// Required acknowledgment value; `None` accepts any byte
    ///
    /// Configuration files write `None` as `"any"`.
    #[cfg_attr(feature = "serde", serde(with = "ack_setting"))]
    pub expected_ack: Option<u8>,
    /// Attempts per frame, clamped to `1..=MAX_ATTEMPTS`
    pub max_attempts: u8,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            byte_settle_ms: 10,
            frame_settle_ms: 100,
            expected_ack: Some(DEFAULT_ACK),
            max_attempts: 3,
        }
    }
}

impl HandshakeConfig {
    fn attempts(&self) -> u8 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS as u8)
    }
}

/// `expected_ack` as either a byte value or the keyword `"any"`
#[cfg(feature = "serde")]
mod ack_setting {
    use core::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    const ANY: &str = "any";

    pub fn serialize<S: Serializer>(ack: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        match ack {
            Some(byte) => serializer.serialize_u8(*byte),
            None => serializer.serialize_str(ANY),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        deserializer.deserialize_any(AckVisitor)
    }

    struct AckVisitor;

    impl<'de> Visitor<'de> for AckVisitor {
        type Value = Option<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a byte value or \"any\"")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u8::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            u8::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if v.eq_ignore_ascii_case(ANY) {
                Ok(None)
            } else {
                Err(E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }
    }
}

/// Driver progress through one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeState {
    Idle,
    /// Sending the byte at this index
    Transmitting { index: u8 },
    AwaitingFinalStatus,
    Done,
    Failed,
}

/// A rejected acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nack {
    /// Attempt number, starting at 1
    pub attempt: u8,
    /// Frame byte that was not acknowledged
    pub index: u8,
    /// Byte received instead of the expected acknowledgment
    pub ack: u8,
}

/// Outcome of a delivered frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeReport {
    /// Acknowledgments of the successful attempt
    pub acks: [u8; FRAME_LEN],
    /// Final status byte
    pub status: u8,
    /// Attempts used, including the successful one
    pub attempts: u8,
    /// Acknowledgments rejected by earlier attempts
    pub rejected: Vec<Nack, MAX_ATTEMPTS>,
}

/// Errors that abort a frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError<E> {
    /// Writing a frame byte failed
    Write { index: u8, error: E },
    /// Reading the acknowledgment of a frame byte failed
    Read { index: u8, error: E },
    /// Reading the final status byte failed
    Status(E),
    /// Every attempt was answered with a wrong acknowledgment
    Nack { index: u8, ack: u8, attempts: u8 },
}

impl<E> HandshakeError<E> {
    /// Underlying transport error, if any
    pub fn io_error(&self) -> Option<&E> {
        match self {
            HandshakeError::Write { error, .. } | HandshakeError::Read { error, .. } => Some(error),
            HandshakeError::Status(error) => Some(error),
            HandshakeError::Nack { .. } => None,
        }
    }
}

impl<E: core::fmt::Display> core::fmt::Display for HandshakeError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HandshakeError::Write { index, error } => {
                write!(f, "write of frame byte {} failed: {}", index, error)
            }
            HandshakeError::Read { index, error } => {
                write!(f, "acknowledgment read for frame byte {} failed: {}", index, error)
            }
            HandshakeError::Status(error) => write!(f, "final status read failed: {}", error),
            HandshakeError::Nack {
                index,
                ack,
                attempts,
            } => write!(
                f,
                "frame byte {} answered with {:#04x} after {} attempt(s)",
                index, ack, attempts
            ),
        }
    }
}

impl<E> core::error::Error for HandshakeError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.io_error().map(|e| e as &(dyn core::error::Error + 'static))
    }
}

type TransportError<U> = <U as UartTx>::Error;

enum Attempt {
    Accepted([u8; FRAME_LEN]),
    Rejected { index: u8, ack: u8 },
}

/// Delivers motion frames over a borrowed serial channel
pub struct HandshakeDriver<'a, U, D> {
    channel: &'a mut U,
    delay: D,
    config: HandshakeConfig,
    state: HandshakeState,
}

impl<'a, U, D> HandshakeDriver<'a, U, D>
where
    U: UartTx + UartRx<Error = <U as UartTx>::Error>,
    D: DelayNs,
{
    pub fn new(channel: &'a mut U, delay: D, config: HandshakeConfig) -> Self {
        Self {
            channel,
            delay,
            config,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Send one frame and collect the controller's answers
    pub fn transmit(
        &mut self,
        frame: &MotionFrame,
    ) -> Result<HandshakeReport, HandshakeError<TransportError<U>>> {
        self.state = HandshakeState::Idle;
        let result = self.drive(frame);
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn drive(
        &mut self,
        frame: &MotionFrame,
    ) -> Result<HandshakeReport, HandshakeError<TransportError<U>>> {
        let max_attempts = self.config.attempts();
        let mut rejected = Vec::new();
        let mut attempt = 0u8;

        let acks = loop {
            attempt += 1;
            match self.send_attempt(frame)? {
                Attempt::Accepted(acks) => break acks,
                Attempt::Rejected { index, ack } => {
                    let logged = rejected.push(Nack {
                        attempt,
                        index,
                        ack,
                    });
                    debug_assert!(logged.is_ok(), "attempt {} exceeds the nack log", attempt);
                    if attempt >= max_attempts {
                        return Err(HandshakeError::Nack {
                            index,
                            ack,
                            attempts: attempt,
                        });
                    }
                }
            }
        };

        self.state = HandshakeState::AwaitingFinalStatus;
        self.delay.delay_ms(self.config.frame_settle_ms);
        let status = self.channel.read_byte().map_err(HandshakeError::Status)?;
        self.state = HandshakeState::Done;

        Ok(HandshakeReport {
            acks,
            status,
            attempts: attempt,
            rejected,
        })
    }

    fn send_attempt(
        &mut self,
        frame: &MotionFrame,
    ) -> Result<Attempt, HandshakeError<TransportError<U>>> {
        let mut acks = [0u8; FRAME_LEN];

        for (index, &byte) in frame.as_bytes().iter().enumerate() {
            let index = index as u8;
            self.state = HandshakeState::Transmitting { index };

            self.channel
                .write_byte(byte)
                .map_err(|error| HandshakeError::Write { index, error })?;
            self.delay.delay_ms(self.config.byte_settle_ms);
            let ack = self
                .channel
                .read_byte()
                .map_err(|error| HandshakeError::Read { index, error })?;
            acks[usize::from(index)] = ack;

            if let Some(expected) = self.config.expected_ack {
                if ack != expected {
                    return Ok(Attempt::Rejected { index, ack });
                }
            }
        }

        Ok(Attempt::Accepted(acks))
    }
}
