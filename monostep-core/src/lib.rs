//! Board-agnostic core logic for the monochromator driver
//!
//! This crate contains the application logic that does not depend on a
//! serial port or a filesystem:
//!
//! - Line tokenizer over an owned file image
//! - Calibration record parser
//! - Calibration table with wavelength to step interpolation

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod calibration;
