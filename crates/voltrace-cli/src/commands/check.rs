use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::summary::print_config_summary;

use super::load_config;

#[derive(Args)]
pub struct CheckArgs {
    /// Extraction config file (TOML)
    pub file: PathBuf,
}

pub fn run(args: &CheckArgs) -> Result<()> {
    let config = load_config(&args.file)?;
    config
        .validate()
        .with_context(|| format!("{} is not usable", args.file.display()))?;
    print_config_summary(&config);
    Ok(())
}
