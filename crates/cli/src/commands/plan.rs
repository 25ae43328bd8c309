//! The `plan` command - prints the document the host would be asked to create.

use super::CapabilityProfile;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use uvm::UvmOptions;

#[derive(Args)]
pub struct PlanArgs {
    /// Path to a utility VM options file (TOML)
    file: PathBuf,

    /// Host capabilities to validate against
    #[arg(long, value_enum, default_value_t = CapabilityProfile::All)]
    capabilities: CapabilityProfile,
}

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let options = UvmOptions::load(&args.file)?;
    let config = options
        .configuration(&args.capabilities.capabilities())
        .with_context(|| format!("{} is not a valid utility VM", args.file.display()))?;

    let document = config.to_document();
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
