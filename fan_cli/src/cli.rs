//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "fan", version, about = "Fan tachometer and PWM test rig")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the [[phase]] plan from the config file
    Run {
        /// Directory for the raw and summary CSV files (overrides [output].dir)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Enter a plan at the terminal and run it
    Interactive {
        /// Directory for the raw and summary CSV files (overrides [output].dir)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Spin the fan briefly and report the measured speed
    SelfCheck {
        /// Duty to spin at, in percent
        #[arg(long, value_name = "PCT", default_value_t = 50,
              value_parser = clap::value_parser!(u8).range(0..=95))]
        duty: u8,
        /// How long to spin before reading
        #[arg(long, value_name = "SECS", default_value_t = 3)]
        seconds: u64,
    },
}
