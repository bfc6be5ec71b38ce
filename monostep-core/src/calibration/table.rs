//! Calibration table: sort and wavelength resolution
//!
//! The table goes through a fixed lifecycle:
//!
//! ```text
//! new() ──populate()──▶ Populated ──sort()──▶ Sorted (read-only)
//!                                          └──▶ Invalid (duplicate step or
//!                                                wavelength not increasing)
//! ```
//!
//! Resolution is only available once the table is sorted. Interpolation
//! assumes wavelength increases with step, so [`CalibrationTable::sort`]
//! checks the rows and a table that fails the check answers every
//! [`resolve`](CalibrationTable::resolve) with
//! [`CalibrationError::InvalidTable`].

use alloc::vec::Vec;

use super::{
    parse_points, CalibrationError, CalibrationPoint, LineBuffer, ParseSummary, TableDefect,
};

/// Minimum number of points needed to interpolate
pub const MIN_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    Empty,
    Populated,
    Sorted,
    Invalid(TableDefect),
}

/// Step ↔ wavelength calibration table
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
    state: TableState,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationTable {
    /// Create an empty, uninitialized table
    pub const fn new() -> Self {
        Self {
            points: Vec::new(),
            state: TableState::Empty,
        }
    }

    /// Build a ready table from a raw calibration file image
    ///
    /// Runs tokenize, parse, sort and validate. Malformed lines are
    /// dropped; any table-level failure returns an error and no table.
    pub fn load(image: Vec<u8>) -> Result<Self, CalibrationError> {
        Self::load_with_summary(image).map(|(table, _)| table)
    }

    /// Same as [`load`](Self::load), also reporting line accounting
    pub fn load_with_summary(image: Vec<u8>) -> Result<(Self, ParseSummary), CalibrationError> {
        let lines = LineBuffer::tokenize(image)?;
        let (points, summary) = parse_points(&lines)?;
        drop(lines);

        let table = Self::from_points(points)?;
        Ok((table, summary))
    }

    /// Build a ready table from already parsed points
    pub fn from_points(points: Vec<CalibrationPoint>) -> Result<Self, CalibrationError> {
        let mut table = Self::new();
        table.populate(points)?;
        table.sort();
        table.validate()?;
        Ok(table)
    }

    /// Store parsed points in encounter order
    ///
    /// Can only be done once per table.
    pub fn populate(&mut self, points: Vec<CalibrationPoint>) -> Result<(), CalibrationError> {
        if self.state != TableState::Empty {
            return Err(CalibrationError::AlreadyInitialized);
        }
        self.points = points;
        self.state = TableState::Populated;
        Ok(())
    }

    /// Sort points ascending by step and check the rows
    ///
    /// Stable and idempotent. Has no effect on a table that was never
    /// populated. A table whose sorted rows cannot be interpolated is
    /// marked invalid; [`validate`](Self::validate) reports why.
    pub fn sort(&mut self) {
        if self.state == TableState::Empty {
            return;
        }
        self.points.sort_by_key(|point| point.step);
        self.state = match find_defect(&self.points) {
            Some(defect) => TableState::Invalid(defect),
            None => TableState::Sorted,
        };
    }

    /// Check that the sorted table can be interpolated
    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.ensure_ready()
    }

    /// Whether the table has been populated and sorted
    pub fn is_initialized(&self) -> bool {
        self.state == TableState::Sorted
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in their current order (ascending by step once sorted)
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Wavelengths of the first and last rows
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.wavelength_nm, last.wavelength_nm)),
            _ => None,
        }
    }

    /// Steps of the first and last rows
    pub fn step_range(&self) -> Option<(i32, i32)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.step, last.step)),
            _ => None,
        }
    }

    /// Translate a wavelength into a motor step by linear interpolation
    ///
    /// The result is truncated toward zero.
    pub fn resolve(&self, wavelength_nm: f64) -> Result<i32, CalibrationError> {
        self.ensure_ready()?;

        let (min_nm, max_nm) = self
            .wavelength_range()
            .ok_or(CalibrationError::Underfilled { points: 0 })?;
        let out_of_range = CalibrationError::OutOfRange {
            wavelength_nm,
            min_nm,
            max_nm,
        };

        // NaN fails `contains` as well
        if !(min_nm..=max_nm).contains(&wavelength_nm) {
            return Err(out_of_range);
        }

        let segment = self.points.windows(2).find(|pair| {
            pair[0].wavelength_nm <= wavelength_nm && wavelength_nm <= pair[1].wavelength_nm
        });

        match segment {
            Some(pair) => Ok(interpolate(pair[0], pair[1], wavelength_nm)),
            None => Err(out_of_range),
        }
    }

    fn ensure_ready(&self) -> Result<(), CalibrationError> {
        match self.state {
            TableState::Empty | TableState::Populated => {
                return Err(CalibrationError::NotInitialized)
            }
            TableState::Invalid(defect) => return Err(CalibrationError::InvalidTable(defect)),
            TableState::Sorted => {}
        }
        if self.points.len() < MIN_POINTS {
            return Err(CalibrationError::Underfilled {
                points: self.points.len(),
            });
        }
        Ok(())
    }
}

/// First pair of step-sorted rows that breaks interpolation
fn find_defect(points: &[CalibrationPoint]) -> Option<TableDefect> {
    points.windows(2).find_map(|pair| {
        let (lo, hi) = (pair[0], pair[1]);
        if lo.step == hi.step {
            Some(TableDefect::DuplicateStep { step: hi.step })
        } else if hi.wavelength_nm <= lo.wavelength_nm {
            Some(TableDefect::NonMonotonicWavelength { step: hi.step })
        } else {
            None
        }
    })
}

fn interpolate(lo: CalibrationPoint, hi: CalibrationPoint, wavelength_nm: f64) -> i32 {
    let span_nm = hi.wavelength_nm - lo.wavelength_nm;
    let steps_per_nm = (f64::from(hi.step) - f64::from(lo.step)) / span_nm;
    let step = f64::from(lo.step) + steps_per_nm * (wavelength_nm - lo.wavelength_nm);
    step as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(points: &[(i32, f64)]) -> CalibrationTable {
        let points = points
            .iter()
            .map(|&(step, wl)| CalibrationPoint::new(step, wl))
            .collect();
        CalibrationTable::from_points(points).unwrap()
    }

    #[test]
    fn test_resolve_midpoint() {
        let table = table(&[(100, 600.0), (200, 700.0)]);
        assert_eq!(table.resolve(650.0), Ok(150));
    }

    #[test]
    fn test_resolve_second_segment() {
        let table = table(&[(0, 500.0), (1000, 600.0), (2000, 800.0)]);
        assert_eq!(table.resolve(750.0), Ok(1750));
    }

    #[test]
    fn test_resolve_table_endpoints() {
        let table = table(&[(0, 500.0), (1000, 600.0), (2000, 800.0)]);
        assert_eq!(table.resolve(500.0), Ok(0));
        assert_eq!(table.resolve(600.0), Ok(1000));
        assert_eq!(table.resolve(800.0), Ok(2000));
    }

    #[test]
    fn test_resolve_truncates_toward_zero() {
        let table = table(&[(-10, 400.0), (-7, 403.0)]);
        // -10 + 1 * 1.5 = -8.5 truncates to -8
        assert_eq!(table.resolve(401.5), Ok(-8));
    }

    #[test]
    fn test_resolve_out_of_range() {
        let table = table(&[(100, 600.0), (200, 700.0)]);
        assert!(matches!(
            table.resolve(599.99),
            Err(CalibrationError::OutOfRange { .. })
        ));
        assert!(matches!(
            table.resolve(700.01),
            Err(CalibrationError::OutOfRange { .. })
        ));
        assert!(matches!(
            table.resolve(f64::NAN),
            Err(CalibrationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_resolve_before_initialization() {
        let mut table = CalibrationTable::new();
        assert_eq!(table.resolve(500.0), Err(CalibrationError::NotInitialized));

        table
            .populate(vec![
                CalibrationPoint::new(1, 501.0),
                CalibrationPoint::new(0, 500.0),
            ])
            .unwrap();
        assert_eq!(table.resolve(500.0), Err(CalibrationError::NotInitialized));

        table.sort();
        assert_eq!(table.resolve(500.5), Ok(0));
    }

    #[test]
    fn test_sort_on_empty_table_stays_uninitialized() {
        let mut table = CalibrationTable::new();
        table.sort();
        assert!(!table.is_initialized());
    }

    #[test]
    fn test_populate_twice_is_rejected() {
        let mut table = CalibrationTable::new();
        table.populate(Vec::new()).unwrap();
        assert_eq!(
            table.populate(Vec::new()),
            Err(CalibrationError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_single_point_table_is_underfilled() {
        let mut table = CalibrationTable::new();
        table.populate(vec![CalibrationPoint::new(0, 500.0)]).unwrap();
        table.sort();
        assert_eq!(
            table.resolve(500.0),
            Err(CalibrationError::Underfilled { points: 1 })
        );
    }

    fn sorted_without_validation(points: &[(i32, f64)]) -> CalibrationTable {
        let mut table = CalibrationTable::new();
        table
            .populate(
                points
                    .iter()
                    .map(|&(step, wl)| CalibrationPoint::new(step, wl))
                    .collect(),
            )
            .unwrap();
        table.sort();
        table
    }

    #[test]
    fn test_sorted_non_monotonic_table_refuses_to_resolve() {
        let table = sorted_without_validation(&[(0, 500.0), (100, 650.0), (200, 600.0)]);
        let defect =
            CalibrationError::InvalidTable(TableDefect::NonMonotonicWavelength { step: 200 });

        assert!(!table.is_initialized());
        assert_eq!(table.resolve(550.0), Err(defect));
        assert_eq!(table.resolve(620.0), Err(defect));
        assert_eq!(table.validate(), Err(defect));
    }

    #[test]
    fn test_sorted_duplicate_step_table_refuses_to_resolve() {
        let table = sorted_without_validation(&[(100, 600.0), (100, 700.0)]);
        let defect = CalibrationError::InvalidTable(TableDefect::DuplicateStep { step: 100 });

        assert_eq!(table.resolve(650.0), Err(defect));
        assert_eq!(table.validate(), Err(defect));
    }

    #[test]
    fn test_load_sorts_unordered_file() {
        let image = b"# unordered\n2000\t800.0\n0\t500.0\n1000\t600.0\n".to_vec();
        let (table, summary) = CalibrationTable::load_with_summary(image).unwrap();

        assert_eq!(summary.points, 3);
        assert_eq!(table.step_range(), Some((0, 2000)));
        assert_eq!(table.wavelength_range(), Some((500.0, 800.0)));
        assert_eq!(table.resolve(750.0), Ok(1750));
    }

    #[test]
    fn test_load_comment_only_file_is_underfilled() {
        let result = CalibrationTable::load(b"# comment\n\n\n".to_vec());
        assert_eq!(
            result.unwrap_err(),
            CalibrationError::Underfilled { points: 0 }
        );
    }

    #[test]
    fn test_load_rejects_duplicate_steps() {
        let result = CalibrationTable::load(b"100\t600.0\n100\t610.0\n200\t700.0\n".to_vec());
        assert_eq!(
            result.unwrap_err(),
            CalibrationError::InvalidTable(TableDefect::DuplicateStep { step: 100 })
        );
    }

    #[test]
    fn test_load_rejects_non_monotonic_wavelength() {
        let result = CalibrationTable::load(b"0\t500.0\n100\t650.0\n200\t600.0\n".to_vec());
        assert_eq!(
            result.unwrap_err(),
            CalibrationError::InvalidTable(TableDefect::NonMonotonicWavelength { step: 200 })
        );
    }

    /// Strictly increasing (step, wavelength) rows
    fn monotonic_points() -> impl Strategy<Value = Vec<CalibrationPoint>> {
        (
            -50_000i32..50_000,
            200.0f64..900.0,
            proptest::collection::vec((1i32..2_000, 0.05f64..50.0), 1..24),
        )
            .prop_map(|(mut step, mut wavelength, deltas)| {
                let mut points = vec![CalibrationPoint::new(step, wavelength)];
                for (d_step, d_wl) in deltas {
                    step += d_step;
                    wavelength += d_wl;
                    points.push(CalibrationPoint::new(step, wavelength));
                }
                points
            })
    }

    proptest! {
        #[test]
        fn prop_resolve_agrees_with_bracketing_rows(
            points in monotonic_points(),
            pick in any::<prop::sample::Index>(),
            t in 0.0f64..=1.0,
        ) {
            let segment = pick.index(points.len() - 1);
            let (lo, hi) = (points[segment], points[segment + 1]);
            let wavelength = (lo.wavelength_nm + t * (hi.wavelength_nm - lo.wavelength_nm))
                .clamp(lo.wavelength_nm, hi.wavelength_nm);
            let expected = f64::from(lo.step)
                + (f64::from(hi.step) - f64::from(lo.step)) * (wavelength - lo.wavelength_nm)
                    / (hi.wavelength_nm - lo.wavelength_nm);

            let table = CalibrationTable::from_points(points).unwrap();
            let step = table.resolve(wavelength).unwrap();
            prop_assert!((f64::from(step) - expected).abs() <= 1.0,
                "resolved {} expected {}", step, expected);
        }

        #[test]
        fn prop_resolve_rejects_outside_bounds(
            points in monotonic_points(),
            below in 0.001f64..1000.0,
            above in 0.001f64..1000.0,
        ) {
            let min = points[0].wavelength_nm;
            let max = points[points.len() - 1].wavelength_nm;
            let table = CalibrationTable::from_points(points).unwrap();

            let is_out_of_range =
                |r: Result<i32, CalibrationError>| matches!(r, Err(CalibrationError::OutOfRange { .. }));
            prop_assert!(is_out_of_range(table.resolve(min - below)));
            prop_assert!(is_out_of_range(table.resolve(max + above)));
        }

        #[test]
        fn prop_sort_is_idempotent(
            raw in proptest::collection::vec((any::<i32>(), 100.0f64..2000.0), 0..40),
        ) {
            let points: Vec<_> = raw
                .into_iter()
                .map(|(step, wl)| CalibrationPoint::new(step, wl))
                .collect();

            let mut table = CalibrationTable::new();
            table.populate(points).unwrap();
            table.sort();
            let once = table.points().to_vec();
            table.sort();

            prop_assert_eq!(table.points(), &once[..]);
            prop_assert!(once.windows(2).all(|pair| pair[0].step <= pair[1].step));
        }
    }
}
