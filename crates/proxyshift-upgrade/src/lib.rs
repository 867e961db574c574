mod bootstrap;
mod context;
mod execute;
mod persist;
mod plan;
mod report;

use std::collections::BTreeSet;
use std::path::PathBuf;

use proxyshift_core::{Result, UpgradeConfig, UpgradeError};
use tracing::info;

pub use bootstrap::{run_bootstrap, BootstrapPlan};
pub use context::{ExecutionMode, UpgradeContext};
pub use execute::execute_plan;
pub use persist::{ensure_deployed_version, read_version_marker, write_output_manifest};
pub use plan::{plan_upgrades, UpgradePlanEntry};
pub use report::{NoProgress, Phase, Progress, UpgradeEvent, UpgradeReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub plan: Vec<UpgradePlanEntry>,
    pub manifest_path: PathBuf,
}

/// Plans, executes, bootstraps and persists one migration. The manifest is
/// written only if every step succeeded.
pub fn run_upgrade(
    ctx: &mut UpgradeContext<'_>,
    config: &UpgradeConfig,
    progress: &mut dyn Progress,
) -> Result<UpgradeOutcome> {
    ensure_untouched_descriptors(ctx, config)?;

    let plan = plan_upgrades(ctx, &config.planning_order(), progress)?;
    info!(pending = plan.len(), mode = ?ctx.mode, "planning finished");

    execute_plan(ctx, &plan, progress)?;
    run_bootstrap(ctx, &BootstrapPlan::from_config(config))?;

    descriptor_gap(ctx.manifest.units_missing_interface())?;

    let manifest_path = write_output_manifest(&mut ctx.manifest, config)?;
    ctx.report.push(UpgradeEvent::ManifestWritten {
        path: manifest_path.clone(),
    });
    info!(path = %manifest_path.display(), "Done");

    Ok(UpgradeOutcome {
        plan,
        manifest_path,
    })
}

/// Rejects manifest units this run will not touch that already lack an
/// interface descriptor. Runs before any ledger call, so a rejected manifest
/// leaves the ledger unchanged.
fn ensure_untouched_descriptors(ctx: &UpgradeContext<'_>, config: &UpgradeConfig) -> Result<()> {
    let touched = config
        .planning_order()
        .into_iter()
        .chain(config.fresh_units())
        .map(|unit| ctx.manifest_key(&unit.name))
        .collect::<BTreeSet<_>>();
    descriptor_gap(
        ctx.manifest
            .units_missing_interface()
            .into_iter()
            .filter(|key| !touched.contains(*key))
            .collect(),
    )
}

fn descriptor_gap(missing: Vec<&str>) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(UpgradeError::Manifest(format!(
        "units without interface descriptor: {}",
        missing.join(", ")
    )))
}
