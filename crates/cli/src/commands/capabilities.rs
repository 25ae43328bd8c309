//! The `capabilities` command - shows what a capability profile allows.

use super::CapabilityProfile;
use clap::Args;
use uvm::{GuestPlatform, HostCapabilities, MemoryBackingStrategy};

#[derive(Args)]
pub struct CapabilitiesArgs {
    /// Capability profile to show
    #[arg(long, value_enum, default_value_t = CapabilityProfile::All)]
    profile: CapabilityProfile,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

pub fn run(args: CapabilitiesArgs) -> anyhow::Result<()> {
    let caps = args.profile.capabilities();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
    } else {
        print_text(&caps);
    }
    Ok(())
}

fn print_text(caps: &HostCapabilities) {
    for platform in [GuestPlatform::Linux, GuestPlatform::Windows] {
        println!("  {platform}");
        println!("    Supported: {}", yes_no(caps.supports_platform(platform)));

        let support = caps.memory_support(platform);
        let strategies = MemoryBackingStrategy::ALL
            .iter()
            .map(|s| format!("{s}={}", yes_no(support.supports(*s))))
            .collect::<Vec<_>>()
            .join(", ");
        println!("    Memory backing: {strategies}");
    }

    if caps.max_cpus.is_some() || caps.max_memory_bytes.is_some() {
        println!(
            "  Limits: cpus={}, memory={}",
            caps.max_cpus
                .map_or("unlimited".to_string(), |n| n.to_string()),
            caps.max_memory_bytes
                .map_or("unlimited".to_string(), |n| format!("{n} bytes"))
        );
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
