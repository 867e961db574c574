use proxyshift_core::{Result, UpgradeError};
use tracing::{info, warn};

use crate::{ExecutionMode, Phase, Progress, UpgradeContext, UpgradeEvent, UpgradePlanEntry};

/// Applies `plan` in order. In direct mode the first failed commit aborts the
/// run; in multisig mode nothing is submitted.
pub fn execute_plan(
    ctx: &mut UpgradeContext<'_>,
    plan: &[UpgradePlanEntry],
    progress: &mut dyn Progress,
) -> Result<()> {
    for (index, entry) in plan.iter().enumerate() {
        progress.unit_started(Phase::Executing, index, plan.len(), &entry.unit);
        execute_entry(ctx, entry)?;
    }
    progress.phase_finished(Phase::Executing);
    Ok(())
}

fn execute_entry(ctx: &mut UpgradeContext<'_>, entry: &UpgradePlanEntry) -> Result<()> {
    let unit = entry.unit.as_str();
    let key = ctx.manifest_key(unit);

    // Chain state may have moved since planning; never reuse the planned target.
    let factory = ctx.build_factory(unit)?;
    let target = ctx.ledger().prepare_upgrade(entry.proxy, &factory)?;
    if target != entry.new_implementation {
        warn!(
            unit,
            planned = %entry.new_implementation,
            %target,
            "prepared implementation changed since planning"
        );
    }

    match ctx.mode {
        ExecutionMode::MultisigProposal => {
            info!("Upgrade {unit} at {} to {target}", entry.proxy);
            ctx.report.push(UpgradeEvent::MultisigUpgrade {
                unit: unit.to_string(),
                proxy: entry.proxy,
                implementation: target,
            });
        }
        ExecutionMode::Direct => {
            info!("Upgrade {unit} at {}", entry.proxy);
            let tx = ctx
                .ledger()
                .upgrade_proxy(entry.proxy, &factory)
                .map_err(|err| UpgradeError::transaction(unit, err))?;
            let receipt = ctx.confirm(unit, &tx)?;

            let active = ctx.ledger().implementation_address(entry.proxy)?;
            if active != target {
                warn!(unit, expected = %target, %active, "proxy points at an unexpected implementation");
            }
            info!(unit, gas_used = receipt.gas_used, tx = %receipt.tx_hash, "upgrade confirmed");
            ctx.report.push(UpgradeEvent::Upgraded {
                unit: unit.to_string(),
                proxy: entry.proxy,
                implementation: active,
                gas_used: receipt.gas_used,
            });
        }
    }

    // Multisig runs stage the descriptor before the upgrade is live.
    ctx.manifest.set_unit_interface(&key, factory.interface);
    Ok(())
}
