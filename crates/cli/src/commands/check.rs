//! The `check` command - validates an options file and reports the resolved
//! memory backing strategy.

use super::CapabilityProfile;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use uvm::{UvmOptions, VmConfiguration};

#[derive(Args)]
pub struct CheckArgs {
    /// Path to a utility VM options file (TOML)
    file: PathBuf,

    /// Host capabilities to validate against
    #[arg(long, value_enum, default_value_t = CapabilityProfile::All)]
    capabilities: CapabilityProfile,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let options = UvmOptions::load(&args.file)?;
    let config = options
        .configuration(&args.capabilities.capabilities())
        .with_context(|| format!("{} is not a valid utility VM", args.file.display()))?;

    tracing::debug!(id = config.id(), strategy = %config.backing(), "options resolved");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary(&config))?);
    } else {
        print_text(&config);
    }
    Ok(())
}

fn summary(config: &VmConfiguration) -> serde_json::Value {
    serde_json::json!({
        "id": config.id(),
        "guest_platform": config.guest_platform(),
        "processor_count": config.processor_count(),
        "memory_size_mb": config.memory_size_mb(),
        "memory_backing": config.backing(),
    })
}

fn print_text(config: &VmConfiguration) {
    println!("{}: ok", config.id());
    println!("  Platform: {}", config.guest_platform());
    println!("  Processors: {}", config.processor_count());
    println!("  Memory: {} MB", config.memory_size_mb());
    println!("  Memory backing: {}", config.backing());
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvm::HostCapabilities;

    #[test]
    fn summary_uses_wire_names() {
        let config = UvmOptions::from_toml_str(
            r#"
            id = "uvm-check"
            guest_platform = "linux"
            allow_overcommit = false
            [linux]
            kernel = "/boot/kernel"
            initrd = "/boot/initrd.img"
            "#,
        )
        .unwrap()
        .configuration(&HostCapabilities::all())
        .unwrap();

        let value = summary(&config);
        assert_eq!(value["id"], "uvm-check");
        assert_eq!(value["guest_platform"], "linux");
        assert_eq!(value["memory_backing"], "physically-backed");
        assert_eq!(value["memory_size_mb"], 1024);
    }
}
