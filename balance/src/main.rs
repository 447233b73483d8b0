//! # Balance Runtime
//!
//! Entry point for the headless training binary. Settings come from an
//! optional JSON file; the command line overrides the handful of values
//! that change most between runs.

mod app;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Train an ensemble of cart-pendulum balance controllers
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// JSON settings file; missing sections keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of ensemble ticks to run
    #[arg(long, default_value_t = 100_000)]
    pub ticks: u64,

    /// Override the ensemble size
    #[arg(long)]
    pub members: Option<usize>,

    /// Override the ensemble seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write member checkpoints into this directory
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Log a population summary every N ticks
    #[arg(long, default_value_t = 1_000)]
    pub report_every: u64,
}

fn main() -> Result<()> {
    app::run(Args::parse())
}
