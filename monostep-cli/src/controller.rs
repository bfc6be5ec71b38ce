//! Command execution
//!
//! Glues the calibration table, the frame encoder and the serial
//! handshake together for each command.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use monostep_core::calibration::CalibrationTable;
use monostep_hal_host::{available_ports, SerialChannel, StdDelay};
use monostep_protocol::{HandshakeDriver, HandshakeReport, HexDump, MotionFrame, MotionRequest};

use crate::config::{Config, MotorConfig};
use crate::source::read_file_image;

/// Load, sort and validate a calibration table file
pub fn load_table(path: &Path) -> Result<CalibrationTable> {
    let image = read_file_image(path)
        .with_context(|| format!("Failed to read calibration table {}", path.display()))?;

    let (table, summary) = CalibrationTable::load_with_summary(image)
        .with_context(|| format!("Invalid calibration table {}", path.display()))?;

    debug!(
        "Calibration table {}: {} point(s), {} comment line(s)",
        path.display(),
        summary.points,
        summary.comments
    );
    if summary.dropped > 0 {
        warn!(
            "Calibration table {}: ignored {} malformed line(s)",
            path.display(),
            summary.dropped
        );
    }

    Ok(table)
}

/// Build a move from the motor defaults and the requested step count
pub fn motion_request(motor: &MotorConfig, step_count: i32) -> Result<MotionRequest> {
    let request = MotionRequest::new(step_count, motor.frequency_hz, motor.microstep);
    if !request.fits_in_frame() {
        bail!(
            "Move of {} steps exceeds the {} steps a single frame can carry",
            step_count,
            u16::MAX
        );
    }
    Ok(request)
}

/// Relative move from `from_step` to the step of `wavelength_nm`
pub fn goto_delta(table: &CalibrationTable, wavelength_nm: f64, from_step: i32) -> Result<i32> {
    let target = table.resolve(wavelength_nm)?;
    let delta = target
        .checked_sub(from_step)
        .ok_or_else(|| anyhow!("Move from step {} to step {} overflows", from_step, target))?;

    info!(
        "{} nm is step {}, moving {} step(s) from {}",
        wavelength_nm, target, delta, from_step
    );
    Ok(delta)
}

pub fn encode(motor: &MotorConfig, request: &MotionRequest) -> Result<MotionFrame> {
    let frame = MotionFrame::encode(request, &motor.frame_options())
        .with_context(|| format!("Cannot encode a move at {} Hz", request.frequency_hz))?;
    Ok(frame)
}

/// `resolve`: print the step for a wavelength
pub fn resolve(config: &Config, wavelength_nm: f64) -> Result<()> {
    let table = load_table(&config.calibration.file)?;
    let step = table.resolve(wavelength_nm)?;
    println!("{}", step);
    Ok(())
}

/// `table`: print the sorted calibration table
pub fn print_table(config: &Config) -> Result<()> {
    let table = load_table(&config.calibration.file)?;

    for (index, point) in table.points().iter().enumerate() {
        println!("{}\t{}\t{:.6}", index, point.step, point.wavelength_nm);
    }
    if let (Some((min_nm, max_nm)), Some((min_step, max_step))) =
        (table.wavelength_range(), table.step_range())
    {
        info!(
            "Covers {} nm to {} nm, steps {} to {}",
            min_nm, max_nm, min_step, max_step
        );
    }
    Ok(())
}

/// `frame`: print the encoded frame without touching the device
pub fn print_frame(config: &Config, step_count: i32) -> Result<()> {
    let request = motion_request(&config.motor, step_count)?;
    let frame = encode(&config.motor, &request)?;
    println!("{}", HexDump(frame.as_bytes()));
    Ok(())
}

/// `rotate`: move by a relative number of steps
pub fn rotate(config: &Config, step_count: i32, dry_run: bool) -> Result<()> {
    let request = motion_request(&config.motor, step_count)?;
    execute_move(config, &request, dry_run)
}

/// `goto`: move the grating to a wavelength
pub fn goto(config: &Config, wavelength_nm: f64, from_step: i32, dry_run: bool) -> Result<()> {
    let table = load_table(&config.calibration.file)?;
    let delta = goto_delta(&table, wavelength_nm, from_step)?;
    let request = motion_request(&config.motor, delta)?;
    execute_move(config, &request, dry_run)
}

/// `ports`: list serial devices
pub fn list_ports() -> Result<()> {
    let ports = available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("(none)");
    }
    for port in ports {
        println!("{}\t{}", port.name, port.kind);
    }
    Ok(())
}

fn execute_move(config: &Config, request: &MotionRequest, dry_run: bool) -> Result<()> {
    let frame = encode(&config.motor, request)?;

    info!(
        "Move {} step(s) {:?} at {} Hz{}",
        request.step_magnitude(),
        request.direction(),
        request.frequency_hz,
        if request.microstep { ", microstep" } else { "" }
    );

    if dry_run {
        println!("{}", HexDump(frame.as_bytes()));
        return Ok(());
    }
    debug!("Frame:\n{}", HexDump(frame.as_bytes()));

    let report = send_frame(config, &frame)?;
    println!(
        "status {:#04x} after {} attempt(s)",
        report.status, report.attempts
    );
    Ok(())
}

fn send_frame(config: &Config, frame: &MotionFrame) -> Result<HandshakeReport> {
    let device = &config.serial.device;
    let mut channel = SerialChannel::open(&config.serial)?;

    let report = HandshakeDriver::new(&mut channel, StdDelay, config.handshake)
        .transmit(frame)
        .with_context(|| format!("Frame not delivered to {}", device))?;

    for nack in &report.rejected {
        warn!(
            "Attempt {}: byte {} answered with {:#04x}",
            nack.attempt, nack.index, nack.ack
        );
    }
    for (index, ack) in report.acks.iter().enumerate() {
        debug!("Ack {}: {:#04x}", index, ack);
    }
    debug!("Status: {:#04x}", report.status);

    channel
        .close()
        .with_context(|| format!("Failed to close {}", device))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monostep_core::calibration::CalibrationError;
    use std::fs;

    const TABLE: &str = "# grating 1200 l/mm\n\
                         2000\t800.0\n\
                         0\t500.0\n\
                         1000\t600.0\n\
                         not a record\n";

    fn table_file(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("calibration.txt");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_load_table_sorts_and_drops_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let table = load_table(&table_file(&dir, TABLE)).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.points()[0].step, 0);
        assert_eq!(table.resolve(750.0).unwrap(), 1750);
    }

    #[test]
    fn test_load_table_reports_underfilled() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(&table_file(&dir, "# comment\n\n\n")).unwrap_err();

        assert_eq!(
            err.downcast_ref::<CalibrationError>(),
            Some(&CalibrationError::Underfilled { points: 0 })
        );
    }

    #[test]
    fn test_load_table_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_table(&dir.path().join("absent.txt")).is_err());
    }

    #[test]
    fn test_goto_delta_relative_to_current_step() {
        let dir = tempfile::tempdir().unwrap();
        let table = load_table(&table_file(&dir, TABLE)).unwrap();

        assert_eq!(goto_delta(&table, 750.0, 0).unwrap(), 1750);
        assert_eq!(goto_delta(&table, 550.0, 1000).unwrap(), -500);
        assert!(goto_delta(&table, 900.0, 0).is_err());
    }

    #[test]
    fn test_motion_request_rejects_oversized_moves() {
        let motor = MotorConfig::default();

        assert!(motion_request(&motor, 65_535).is_ok());
        assert!(motion_request(&motor, -65_535).is_ok());
        assert!(motion_request(&motor, 65_536).is_err());
    }

    #[test]
    fn test_encode_full_turn() {
        let motor = MotorConfig::default();
        let request = motion_request(&motor, 6400).unwrap();
        let frame = encode(&motor, &request).unwrap();

        assert_eq!(frame.as_bytes(), &[0xF6, 0xFF, 0x19, 0x00, 0x0F]);
    }

    #[test]
    fn test_encode_rejects_zero_frequency() {
        let motor = MotorConfig {
            frequency_hz: 0,
            ..MotorConfig::default()
        };
        let request = motion_request(&motor, 10).unwrap();
        assert!(encode(&motor, &request).is_err());
    }

    #[test]
    fn test_dry_run_does_not_open_device() {
        let mut config = Config::default();
        config.serial.device = String::from("/dev/monostep-does-not-exist");

        assert!(rotate(&config, 100, true).is_ok());
        assert!(rotate(&config, 100, false).is_err());
    }
}
