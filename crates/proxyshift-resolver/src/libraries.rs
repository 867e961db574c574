use std::time::Duration;

use proxyshift_artifacts::{verify_bytecode_hash, Artifact, ArtifactSource};
use proxyshift_core::{
    Address, ArtifactError, LedgerError, LibraryRecord, Manifest, Result, UnitFactory,
    UpgradeError,
};
use proxyshift_ledger::Ledger;
use tracing::{debug, info};

use crate::{LibraryBindingSet, LibraryStatus, ResolvedLibraries};

/// Classifies every library `unit` links against as stale or current.
pub fn classify_libraries(
    unit: &Artifact,
    artifacts: &dyn ArtifactSource,
    manifest: &Manifest,
) -> Result<Vec<(String, LibraryStatus)>> {
    unit.library_names()
        .into_iter()
        .map(|name| {
            let library = load_library(&unit.contract_name, name, artifacts)?;
            Ok((name.to_string(), library_status(&library, manifest.library(name))))
        })
        .collect()
}

/// Redeploys stale libraries, reuses current ones, and returns a binding for
/// every library `unit` declares. Newly deployed libraries are recorded in
/// `manifest` immediately.
pub fn resolve_libraries(
    unit: &Artifact,
    artifacts: &dyn ArtifactSource,
    manifest: &mut Manifest,
    ledger: &dyn Ledger,
    confirmation_timeout: Duration,
) -> Result<ResolvedLibraries> {
    let unit_name = unit.contract_name.as_str();
    let declared = unit.library_names();

    let mut resolved = ResolvedLibraries::default();
    let mut stale = Vec::new();
    for name in &declared {
        let library = load_library(unit_name, name, artifacts)?;
        match library_status(&library, manifest.library(name)) {
            LibraryStatus::Current {
                address: Some(address),
            } => {
                debug!(unit = unit_name, library = name, %address, "library is current");
                resolved.bindings.insert(*name, address);
            }
            LibraryStatus::Current { address: None } => {
                return Err(UpgradeError::MissingDependency {
                    unit: unit_name.to_string(),
                    library: name.to_string(),
                });
            }
            LibraryStatus::Stale { .. } => stale.push((*name, library)),
        }
    }

    for (name, library) in stale {
        let address = deploy_library(name, &library, ledger, confirmation_timeout)?;
        manifest.record_library(name, address, library.bytecode_hash());
        info!(unit = unit_name, library = name, %address, "library redeployed");
        resolved.bindings.insert(name, address);
        resolved.redeployed.push((name.to_string(), address));
    }

    ensure_complete(unit_name, &declared, &resolved.bindings)?;
    Ok(resolved)
}

fn library_status(library: &Artifact, record: Option<&LibraryRecord>) -> LibraryStatus {
    let recorded_hash = record.and_then(|record| record.hashed_bytecode.clone());
    match &recorded_hash {
        Some(hash) if verify_bytecode_hash(&library.bytecode, hash) => LibraryStatus::Current {
            address: record.and_then(|record| record.address),
        },
        _ => LibraryStatus::Stale {
            current_hash: library.bytecode_hash(),
            recorded_hash,
        },
    }
}

fn load_library(unit: &str, name: &str, artifacts: &dyn ArtifactSource) -> Result<Artifact> {
    match artifacts.artifact(name) {
        Ok(library) => Ok(library),
        Err(ArtifactError::NotFound(_)) => Err(UpgradeError::MissingDependency {
            unit: unit.to_string(),
            library: name.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

fn deploy_library(
    name: &str,
    library: &Artifact,
    ledger: &dyn Ledger,
    confirmation_timeout: Duration,
) -> Result<Address> {
    if let Some(nested) = library.library_names().first() {
        return Err(UpgradeError::UnresolvedLink {
            unit: name.to_string(),
            library: nested.to_string(),
        });
    }

    let factory = UnitFactory::new(name, library.bytecode.clone(), library.abi.clone());
    let tx = ledger
        .deploy(&factory)
        .map_err(|err| UpgradeError::transaction(name, err))?;
    let receipt = ledger
        .wait_for_confirmation(&tx, confirmation_timeout)
        .map_err(|err| UpgradeError::transaction(name, err))?;
    receipt.contract_address.ok_or_else(|| {
        UpgradeError::transaction(
            name,
            LedgerError::InvalidResponse(format!("deployment {tx} has no contract address")),
        )
    })
}

fn ensure_complete(unit: &str, declared: &[&str], bindings: &LibraryBindingSet) -> Result<()> {
    match declared.iter().find(|name| !bindings.contains(name)) {
        Some(missing) => Err(UpgradeError::MissingDependency {
            unit: unit.to_string(),
            library: missing.to_string(),
        }),
        None => Ok(()),
    }
}
