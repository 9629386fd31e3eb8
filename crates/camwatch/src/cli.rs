//! Clap derive structures for the `camwatch` daemon.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// camwatch -- relay camera motion alarms to a Vera controller
#[derive(Debug, Parser)]
#[command(
    name = "camwatch",
    version,
    about = "Watch Dahua/Amcrest camera alarm streams and report motion to Vera",
    long_about = "Keeps one event stream open per configured camera, debounces\n\
        Start/Stop alarms, and sets the Tripped variable of the matching\n\
        Vera security sensor. Dropped streams are retried every few seconds."
)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CAMWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Validate the configuration, print the camera roster, and exit
    #[arg(long)]
    pub check: bool,

    /// Log output format
    #[arg(long, env = "CAMWATCH_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}
