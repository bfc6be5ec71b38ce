//! Motion frame encoding
//!
//! Frame format:
//! - FREQUENCY WORD (2 bytes, big-endian): `0xFFFF - clock / divisor`, the
//!   reload value of the controller's step timer
//! - STEP MAGNITUDE (2 bytes, big-endian): `|step_count|` truncated to 16 bits
//! - CONTROL (1 byte): mode flags, see [`control`]
//!
//! Below [`LOW_SPEED_THRESHOLD_HZ`] the timer runs from a prescaled clock
//! (divisor `frequency * 64`) and the low-speed flag is set.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of bytes in a motion frame
pub const FRAME_LEN: usize = 5;

/// Step timer source clock of the stock controller board (7.3728 MHz)
pub const SOURCE_CLOCK_HZ: u32 = 7_372_800;

/// Frequencies below this use the prescaled timer
pub const LOW_SPEED_THRESHOLD_HZ: u32 = 120;

/// Timer prescaler in low-speed mode
pub const LOW_SPEED_PRESCALER: u32 = 64;

/// Control byte the controller firmware is known to accept for every move
pub const LITERAL_CONTROL_BYTE: u8 = 0x0F;

/// Control byte flags
pub mod control {
    /// Microstepping enabled
    pub const MICROSTEP: u8 = 1 << 0;
    /// Negative direction
    pub const REVERSE: u8 = 1 << 2;
    /// Reset line held inactive; must always be set
    pub const RESET_HOLD: u8 = 1 << 3;
    /// Step timer runs from the prescaled clock
    pub const LOW_SPEED: u8 = 1 << 4;
}

/// Errors that can occur while encoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A step frequency of 0 Hz has no timer period
    ZeroFrequency,
    /// Timer period does not fit the 16-bit frequency word
    FrequencyTooLow { frequency_hz: u32 },
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::ZeroFrequency => f.write_str("step frequency must be non-zero"),
            FrameError::FrequencyTooLow { frequency_hz } => write!(
                f,
                "step frequency {} Hz is below what the 16-bit timer can produce",
                frequency_hz
            ),
        }
    }
}

impl core::error::Error for FrameError {}

/// Motor rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Increasing step position
    Forward,
    /// Decreasing step position
    Reverse,
}

/// Which control byte goes on the wire
///
/// `Literal` always sends `0x0F`, the byte the controller has been run
/// with in practice. `Computed` sends the direction, microstep and
/// low-speed flags derived from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ControlByteMode {
    #[default]
    Literal,
    Computed,
}

/// One relative move of the grating motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionRequest {
    /// Signed number of steps to move
    pub step_count: i32,
    /// Step rate in Hz
    pub frequency_hz: u32,
    /// Drive in microstep mode
    pub microstep: bool,
}

impl MotionRequest {
    pub const fn new(step_count: i32, frequency_hz: u32, microstep: bool) -> Self {
        Self {
            step_count,
            frequency_hz,
            microstep,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.step_count < 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// Step magnitude as it appears on the wire
    pub fn step_magnitude(&self) -> u16 {
        self.step_count.unsigned_abs() as u16
    }

    /// Whether the step magnitude survives the 16-bit field unchanged
    pub fn fits_in_frame(&self) -> bool {
        self.step_count.unsigned_abs() <= u32::from(u16::MAX)
    }
}

/// Encoder settings that depend on the controller, not the move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameOptions {
    /// Step timer source clock in Hz
    pub source_clock_hz: u32,
    /// Control byte policy
    pub control: ControlByteMode,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            source_clock_hz: SOURCE_CLOCK_HZ,
            control: ControlByteMode::Literal,
        }
    }
}

/// Compute the timer reload word for a step frequency
///
/// Returns the word and whether the low-speed prescaler is in use.
pub fn frequency_word(frequency_hz: u32, source_clock_hz: u32) -> Result<(u16, bool), FrameError> {
    if frequency_hz == 0 {
        return Err(FrameError::ZeroFrequency);
    }

    let low_speed = frequency_hz < LOW_SPEED_THRESHOLD_HZ;
    let divisor = if low_speed {
        frequency_hz * LOW_SPEED_PRESCALER
    } else {
        frequency_hz
    };

    let ticks = source_clock_hz / divisor;
    let ticks = u16::try_from(ticks).map_err(|_| FrameError::FrequencyTooLow { frequency_hz })?;

    Ok((u16::MAX - ticks, low_speed))
}

/// Control byte derived from the request
pub fn computed_control(request: &MotionRequest, low_speed: bool) -> u8 {
    let mut byte = control::RESET_HOLD;
    if low_speed {
        byte |= control::LOW_SPEED;
    }
    if request.direction() == Direction::Reverse {
        byte |= control::REVERSE;
    }
    if request.microstep {
        byte |= control::MICROSTEP;
    }
    byte
}

/// An encoded motion command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionFrame {
    bytes: [u8; FRAME_LEN],
}

impl MotionFrame {
    /// Encode a motion request
    pub fn encode(request: &MotionRequest, options: &FrameOptions) -> Result<Self, FrameError> {
        let (word, low_speed) = frequency_word(request.frequency_hz, options.source_clock_hz)?;
        let [freq_hi, freq_lo] = word.to_be_bytes();
        let [steps_hi, steps_lo] = request.step_magnitude().to_be_bytes();

        let control = match options.control {
            ControlByteMode::Literal => LITERAL_CONTROL_BYTE,
            ControlByteMode::Computed => computed_control(request, low_speed),
        };

        Ok(Self {
            bytes: [freq_hi, freq_lo, steps_hi, steps_lo, control],
        })
    }

    /// Wrap raw frame bytes
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn frequency_word(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn step_magnitude(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }

    pub fn control(&self) -> u8 {
        self.bytes[4]
    }
}
