use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use voltrace_core::{extract_cell, ExtractionConfig};

use crate::summary::print_cell_summary;
use crate::synthetic::simulate;

use super::load_config;

#[derive(Args)]
pub struct DemoArgs {
    /// Number of frames to simulate
    #[arg(long, default_value = "1000")]
    pub frames: usize,

    /// Side of the square field of view in pixels
    #[arg(long, default_value = "20")]
    pub size: usize,

    /// Number of injected spikes
    #[arg(long, default_value = "20")]
    pub spikes: usize,

    /// Frame rate in Hz
    #[arg(long, default_value = "400")]
    pub frame_rate: f64,

    /// Random seed
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Extraction config file (TOML); defaults suited to the simulation otherwise
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Config matching the simulated recording: positive-going signal, a small
/// censor region and one background component per oscillation.
fn demo_config() -> ExtractionConfig {
    ExtractionConfig {
        flip_signal: false,
        censor_size: 4,
        n_pc_bg: 3,
        ..Default::default()
    }
}

pub fn run(args: &DemoArgs) -> Result<()> {
    let config = match args.config {
        Some(ref path) => load_config(path)?,
        None => demo_config(),
    };

    let recording = simulate(args.frames, args.size, args.spikes, args.frame_rate, args.seed);
    info!(
        frames = args.frames,
        size = args.size,
        injected = recording.spikes.len(),
        "Simulated recording"
    );

    let result = extract_cell(
        &recording.movie,
        &recording.roi,
        args.frame_rate,
        0,
        None,
        &config,
    )
    .context("Extraction failed")?;

    print_cell_summary(&result, &recording.spikes);
    Ok(())
}
