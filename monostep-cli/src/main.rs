//! Monostep command-line tool
//!
//! Resolves wavelengths against a calibration table and moves the grating
//! motor of a monochromator through its serial stepper controller.
//!
//! # Flow
//!
//! ```text
//! calibration file ─▶ source ─▶ CalibrationTable ─▶ step
//!                                                    │
//!           MotionRequest ◀── goto / rotate ◀────────┘
//!                 │
//!                 ▼
//!           MotionFrame ─▶ HandshakeDriver ─▶ SerialChannel ─▶ controller
//! ```

mod config;
mod controller;
mod source;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use monostep_protocol::ControlByteMode;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "monostep", version)]
#[command(about = "Monochromator grating stepper driver")]
struct Args {
    /// Configuration file (defaults to ./monostep.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Accept any acknowledgment byte from the controller
    #[arg(long, global = true)]
    accept_any_ack: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the motor step for a wavelength
    Resolve {
        /// Wavelength in nm
        #[arg(short, long)]
        wavelength: f64,

        #[command(flatten)]
        table: TableArgs,
    },

    /// Print the sorted calibration table
    Table {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Move the grating by a relative number of steps
    Rotate {
        /// Signed step count
        #[arg(short, long, allow_hyphen_values = true)]
        steps: i32,

        #[command(flatten)]
        motion: MotionArgs,
    },

    /// Move the grating to a wavelength
    Goto {
        /// Target wavelength in nm
        #[arg(short, long)]
        wavelength: f64,

        /// Step the grating is currently at
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        from_step: i32,

        #[command(flatten)]
        table: TableArgs,

        #[command(flatten)]
        motion: MotionArgs,
    },

    /// Print the frame for a move without sending it
    Frame {
        /// Signed step count
        #[arg(short, long, allow_hyphen_values = true)]
        steps: i32,

        #[command(flatten)]
        rate: RateArgs,
    },

    /// List serial devices
    Ports,
}

#[derive(ClapArgs, Debug, Clone)]
struct TableArgs {
    /// Calibration table file
    #[arg(long)]
    calibration: Option<PathBuf>,
}

impl TableArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(file) = &self.calibration {
            config.calibration.file = file.clone();
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
struct RateArgs {
    /// Step rate in Hz
    #[arg(short, long)]
    frequency: Option<u32>,

    /// Drive in microstep mode
    #[arg(short, long)]
    microstep: bool,

    /// Control byte policy
    #[arg(long, value_enum)]
    control_byte: Option<ControlByteArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ControlByteArg {
    /// Always send 0x0F
    Literal,
    /// Send the direction, microstep and low-speed flags
    Computed,
}

impl From<ControlByteArg> for ControlByteMode {
    fn from(arg: ControlByteArg) -> Self {
        match arg {
            ControlByteArg::Literal => ControlByteMode::Literal,
            ControlByteArg::Computed => ControlByteMode::Computed,
        }
    }
}

impl RateArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(frequency) = self.frequency {
            config.motor.frequency_hz = frequency;
        }
        if self.microstep {
            config.motor.microstep = true;
        }
        if let Some(control) = self.control_byte {
            config.motor.control_byte = control.into();
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
struct MotionArgs {
    #[command(flatten)]
    rate: RateArgs,

    /// Serial device of the stepper controller
    #[arg(short, long)]
    device: Option<String>,

    /// Print the frame instead of sending it
    #[arg(long)]
    dry_run: bool,
}

impl MotionArgs {
    fn apply(&self, config: &mut Config) {
        self.rate.apply(config);
        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = config::load_config(args.config.as_deref())?;
    if args.accept_any_ack {
        config.handshake.expected_ack = None;
    }

    match &args.command {
        Command::Resolve { wavelength, table } => {
            table.apply(&mut config);
            controller::resolve(&config, *wavelength)
        }
        Command::Table { table } => {
            table.apply(&mut config);
            controller::print_table(&config)
        }
        Command::Rotate { steps, motion } => {
            motion.apply(&mut config);
            controller::rotate(&config, *steps, motion.dry_run)
        }
        Command::Goto {
            wavelength,
            from_step,
            table,
            motion,
        } => {
            table.apply(&mut config);
            motion.apply(&mut config);
            controller::goto(&config, *wavelength, *from_step, motion.dry_run)
        }
        Command::Frame { steps, rate } => {
            rate.apply(&mut config);
            controller::print_frame(&config, *steps)
        }
        Command::Ports => controller::list_ports(),
    }
}
