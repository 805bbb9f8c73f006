use anyhow::Result;

use crate::config::Config;
use crate::gate::{GateDecision, VersionGate};
use crate::provider::LocalVersionProvider;
use crate::runtime::Runtime;

/// Gate decision for every package in the plan, without touching the filesystem.
pub fn gate_decisions<R: Runtime>(runtime: &R, config: &Config) -> Vec<(String, GateDecision)> {
    let provider = LocalVersionProvider::new(runtime, &config.packages);
    let gate = VersionGate::new(runtime, &config.install_root);
    config
        .packages
        .iter()
        .map(|p| (p.name.clone(), gate.check(&provider, &p.name)))
        .collect()
}

#[tracing::instrument(skip(runtime, config))]
pub fn status<R: Runtime>(runtime: R, config: &Config) -> Result<()> {
    let decisions = gate_decisions(&runtime, config);
    if decisions.is_empty() {
        println!("No packages in the install plan.");
        return Ok(());
    }

    for (name, decision) in decisions {
        match decision {
            GateDecision::NotPresent => println!("{}: not-present", name),
            GateDecision::UpToDate { version } => println!("{} {}: up-to-date", name, version),
            GateDecision::Required { version } => println!("{} {}: needs-install", name, version),
        }
    }
    Ok(())
}
