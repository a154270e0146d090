//! Writes the commented starter configuration.

use anyhow::{bail, Context, Result};
use clap::Args;
use pyguard_engine::EXAMPLE_CONFIG;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(default_value = "pyguard.yml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists, pass --force to overwrite",
            args.path.display()
        );
    }
    std::fs::write(&args.path, EXAMPLE_CONFIG.trim_start())
        .with_context(|| format!("Failed to write {}", args.path.display()))?;
    println!("✅ Wrote starter configuration to {}", args.path.display());
    Ok(())
}
