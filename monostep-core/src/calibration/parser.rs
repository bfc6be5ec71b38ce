//! Calibration record parser
//!
//! Records are `<step> <wavelength>` pairs, tab separated in files written
//! by the calibration rig. Any run of spaces or tabs is accepted as the
//! separator and extra trailing columns are ignored. A unit glued onto the
//! wavelength (`600.5nm`) is ignored too: the longest leading part of the
//! field that reads as a number is taken.
//!
//! Parsing is best-effort per line: comment lines (`#...`) and lines that
//! do not hold a valid record are skipped without failing the whole file.

use alloc::vec::Vec;

use super::{CalibrationError, CalibrationPoint, LineBuffer};

/// Comment marker at the start of a line
const COMMENT: u8 = b'#';

/// Line accounting from one parse run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseSummary {
    /// Lines that produced a point
    pub points: usize,
    /// Lines starting with `#`
    pub comments: usize,
    /// Lines that were neither comments nor valid records
    pub dropped: usize,
}

/// Parse a single record line
///
/// Returns `None` for anything that is not `<i32> <finite f64>`.
pub fn parse_record(line: &[u8]) -> Option<CalibrationPoint> {
    let text = core::str::from_utf8(line).ok()?;
    let mut fields = text
        .split(|c: char| c == ' ' || c == '\t')
        .filter(|field| !field.is_empty());

    let step = fields.next()?.parse::<i32>().ok()?;
    let wavelength_nm = parse_leading_float(fields.next()?)?;
    if !wavelength_nm.is_finite() {
        return None;
    }

    Some(CalibrationPoint::new(step, wavelength_nm))
}

/// Longest prefix of `field` that parses as a float
fn parse_leading_float(field: &str) -> Option<f64> {
    (1..=field.len())
        .rev()
        .filter(|&end| field.is_char_boundary(end))
        .find_map(|end| field[..end].parse::<f64>().ok())
}

/// Parse every record in a tokenized file, in encounter order
pub fn parse_points(
    lines: &LineBuffer,
) -> Result<(Vec<CalibrationPoint>, ParseSummary), CalibrationError> {
    let mut points = Vec::new();
    points
        .try_reserve_exact(lines.len())
        .map_err(|_| CalibrationError::AllocationFailure)?;

    let mut summary = ParseSummary::default();

    for line in lines.iter() {
        if line.first() == Some(&COMMENT) {
            summary.comments += 1;
            continue;
        }

        match parse_record(line) {
            Some(point) => {
                points.push(point);
                summary.points += 1;
            }
            None => summary.dropped += 1,
        }
    }

    Ok((points, summary))
}
