use proxyshift_core::{InitializeSpec, LedgerError, Result, UnitSpec, UpgradeConfig, UpgradeError};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{ExecutionMode, UpgradeContext, UpgradeEvent};

/// One-time steps that run after every planned upgrade, whether or not any
/// upgrade happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub registry: String,
    pub registry_entry_point: String,
    pub fresh_units: Vec<UnitSpec>,
    pub initialize: Option<InitializeSpec>,
}

impl BootstrapPlan {
    pub fn from_config(config: &UpgradeConfig) -> Self {
        Self {
            registry: config.registry.clone(),
            registry_entry_point: config.registry_entry_point.clone(),
            fresh_units: config.fresh_units(),
            initialize: config.initialize.clone(),
        }
    }
}

pub fn run_bootstrap(ctx: &mut UpgradeContext<'_>, plan: &BootstrapPlan) -> Result<()> {
    for unit in &plan.fresh_units {
        deploy_fresh_unit(ctx, plan, &unit.name)?;
    }
    if let Some(initialize) = &plan.initialize {
        initialize_unit(ctx, initialize)?;
    }
    Ok(())
}

fn deploy_fresh_unit(ctx: &mut UpgradeContext<'_>, plan: &BootstrapPlan, unit: &str) -> Result<()> {
    let registry = ctx
        .proxy_address(&plan.registry)
        .ok_or_else(|| UpgradeError::RequiredUnitMissing(plan.registry.clone()))?;
    let factory = ctx.build_factory(unit)?;

    info!("Deploy {unit}");
    let tx = ctx
        .ledger()
        .deploy_proxy(&factory, &[json!(registry.to_string())])
        .map_err(|err| UpgradeError::transaction(unit, err))?;
    let receipt = ctx.confirm(unit, &tx)?;
    let proxy = receipt.contract_address.ok_or_else(|| {
        UpgradeError::transaction(
            unit,
            LedgerError::InvalidResponse(format!("deployment {tx} has no contract address")),
        )
    })?;
    ctx.report.push(UpgradeEvent::Deployed {
        unit: unit.to_string(),
        proxy,
        gas_used: receipt.gas_used,
    });

    info!("Register {unit} as {unit} => {proxy}");
    let tx = ctx
        .ledger()
        .invoke(
            registry,
            &plan.registry_entry_point,
            &[json!(unit), json!(proxy.to_string())],
        )
        .map_err(|err| UpgradeError::transaction(&plan.registry, err))?;
    ctx.confirm(&plan.registry, &tx)?;
    ctx.report.push(UpgradeEvent::Registered {
        unit: unit.to_string(),
        registry: plan.registry.clone(),
        address: proxy,
    });

    let key = ctx.manifest_key(unit);
    ctx.manifest.set_unit_address(&key, proxy);
    ctx.manifest.set_unit_interface(&key, factory.interface);

    let implementation = ctx.ledger().implementation_address(proxy)?;
    ctx.submit_verification(unit, implementation);
    Ok(())
}

fn initialize_unit(ctx: &mut UpgradeContext<'_>, spec: &InitializeSpec) -> Result<()> {
    let unit = spec.unit.as_str();
    let Some(address) = ctx.proxy_address(unit) else {
        error!("{unit} address was not found! Check your abi!");
        return Err(UpgradeError::RequiredUnitMissing(unit.to_string()));
    };
    warn_unknown_entry_point(ctx, unit, &spec.entry_point);

    match ctx.mode {
        ExecutionMode::MultisigProposal => {
            info!("Call {unit}.{}() at {address}", spec.entry_point);
            ctx.report.push(UpgradeEvent::MultisigCall {
                unit: unit.to_string(),
                entry_point: spec.entry_point.clone(),
                address,
            });
        }
        ExecutionMode::Direct => {
            let tx = ctx
                .ledger()
                .invoke(address, &spec.entry_point, &[])
                .map_err(|err| UpgradeError::transaction(unit, err))?;
            let receipt = ctx.confirm(unit, &tx)?;
            info!(
                "{unit}.{}() was called with {} gas used",
                spec.entry_point, receipt.gas_used
            );
            ctx.report.push(UpgradeEvent::Initialized {
                unit: unit.to_string(),
                entry_point: spec.entry_point.clone(),
                address,
                gas_used: receipt.gas_used,
            });
        }
    }
    Ok(())
}

fn warn_unknown_entry_point(ctx: &UpgradeContext<'_>, unit: &str, entry_point: &str) {
    let key = ctx.manifest_key(unit);
    let declared = ctx
        .manifest
        .unit(&key)
        .and_then(|record| record.abi.as_ref())
        .map(|abi| abi.has_entry_point(entry_point));
    if declared == Some(false) {
        warn!(unit, entry_point, "entry point is not in the recorded interface");
    }
}

