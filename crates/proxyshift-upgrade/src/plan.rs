use proxyshift_core::{Address, DeployMode, Result, UnitSpec, UpgradeError};
use tracing::{debug, info, warn};

use crate::{Phase, Progress, UpgradeContext, UpgradeEvent};

/// A unit whose prepared implementation differs from the live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlanEntry {
    pub unit: String,
    pub proxy: Address,
    pub new_implementation: Address,
    pub current_implementation: Address,
}

/// Plans `units` strictly in order. Fresh units are never planned; units that
/// are already current produce no entry.
pub fn plan_upgrades(
    ctx: &mut UpgradeContext<'_>,
    units: &[UnitSpec],
    progress: &mut dyn Progress,
) -> Result<Vec<UpgradePlanEntry>> {
    let planned = units
        .iter()
        .filter(|unit| unit.mode == DeployMode::Upgrade)
        .collect::<Vec<_>>();

    let mut plan = Vec::new();
    for (index, spec) in planned.iter().enumerate() {
        progress.unit_started(Phase::Planning, index, planned.len(), &spec.name);
        if let Some(entry) = plan_unit(ctx, spec)? {
            plan.push(entry);
        }
    }
    progress.phase_finished(Phase::Planning);
    Ok(plan)
}

fn plan_unit(ctx: &mut UpgradeContext<'_>, spec: &UnitSpec) -> Result<Option<UpgradePlanEntry>> {
    let unit = spec.name.as_str();
    let key = ctx.manifest_key(unit);
    let Some(proxy) = ctx.manifest.unit_address(&key) else {
        if spec.optional {
            warn!(unit, key = %key, "unit is not in the manifest, skipping");
            ctx.report.push(UpgradeEvent::UnitSkipped {
                unit: unit.to_string(),
            });
            return Ok(None);
        }
        return Err(UpgradeError::UnknownUnit(unit.to_string()));
    };

    let factory = ctx.build_factory(unit)?;
    let new_implementation = ctx.ledger().prepare_upgrade(proxy, &factory)?;
    let current_implementation = ctx.ledger().implementation_address(proxy)?;
    debug!(unit, %proxy, %new_implementation, %current_implementation, "prepared");

    if new_implementation == current_implementation {
        info!("Contract {unit} is up to date");
        if ctx.manifest.unit(&key).and_then(|record| record.abi.as_ref()).is_none() {
            ctx.manifest.set_unit_interface(&key, factory.interface);
        }
        ctx.report.push(UpgradeEvent::UpToDate {
            unit: unit.to_string(),
        });
        return Ok(None);
    }

    info!(
        "Contract {unit} at {proxy} will be upgraded from {current_implementation} to {new_implementation}"
    );
    ctx.report.push(UpgradeEvent::UpgradePending {
        unit: unit.to_string(),
        proxy,
        current: current_implementation,
        target: new_implementation,
    });
    ctx.submit_verification(unit, new_implementation);

    Ok(Some(UpgradePlanEntry {
        unit: unit.to_string(),
        proxy,
        new_implementation,
        current_implementation,
    }))
}
