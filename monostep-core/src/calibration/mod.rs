//! Wavelength calibration
//!
//! A calibration file is a loosely formatted text table mapping motor step
//! positions to output wavelengths:
//!
//! ```text
//! # step    wavelength (nm)
//! 0         500.0
//! 1000      600.0
//! 2000      800.0
//! ```
//!
//! Loading goes through three stages, each in its own module:
//!
//! 1. [`lines`] splits the raw file image into line spans
//! 2. [`parser`] turns non-comment lines into [`CalibrationPoint`]s
//! 3. [`table`] sorts the points and interpolates wavelength to step

use core::fmt;

pub mod lines;
pub mod parser;
pub mod table;

pub use lines::{LineBuffer, LineSpan};
pub use parser::{parse_points, parse_record, ParseSummary};
pub use table::CalibrationTable;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One row of the calibration table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationPoint {
    /// Motor position in controller steps
    pub step: i32,
    /// Output wavelength at that position in nanometers
    pub wavelength_nm: f64,
}

impl CalibrationPoint {
    pub const fn new(step: i32, wavelength_nm: f64) -> Self {
        Self {
            step,
            wavelength_nm,
        }
    }
}

/// Structural problems found when validating a sorted table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableDefect {
    /// Two rows share the same step position
    DuplicateStep { step: i32 },
    /// Wavelength does not strictly increase at this step
    NonMonotonicWavelength { step: i32 },
}

/// Errors from loading or querying a calibration table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Line or point storage could not be reserved
    AllocationFailure,
    /// Table has not been populated and sorted yet
    NotInitialized,
    /// Table was already populated
    AlreadyInitialized,
    /// Fewer than two points, nothing to interpolate between
    Underfilled { points: usize },
    /// Requested wavelength lies outside the table
    OutOfRange {
        wavelength_nm: f64,
        min_nm: f64,
        max_nm: f64,
    },
    /// Table rows are inconsistent
    InvalidTable(TableDefect),
}

impl fmt::Display for TableDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableDefect::DuplicateStep { step } => {
                write!(f, "step {} appears more than once", step)
            }
            TableDefect::NonMonotonicWavelength { step } => {
                write!(f, "wavelength does not increase at step {}", step)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::AllocationFailure => {
                f.write_str("failed to allocate calibration storage")
            }
            CalibrationError::NotInitialized => f.write_str("calibration table is not initialized"),
            CalibrationError::AlreadyInitialized => {
                f.write_str("calibration table is already populated")
            }
            CalibrationError::Underfilled { points } => write!(
                f,
                "calibration table has {} usable point(s), at least 2 are required",
                points
            ),
            CalibrationError::OutOfRange {
                wavelength_nm,
                min_nm,
                max_nm,
            } => write!(
                f,
                "wavelength {} nm is outside the calibrated range {}..={} nm",
                wavelength_nm, min_nm, max_nm
            ),
            CalibrationError::InvalidTable(defect) => {
                write!(f, "invalid calibration table: {}", defect)
            }
        }
    }
}

impl core::error::Error for CalibrationError {}
