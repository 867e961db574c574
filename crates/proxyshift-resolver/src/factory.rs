use std::time::Duration;

use proxyshift_artifacts::{Artifact, ArtifactSource};
use proxyshift_core::{Address, Manifest, Result, UnitFactory, UpgradeError};
use proxyshift_ledger::Ledger;

use crate::{resolve_libraries, LibraryBindingSet};

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltFactory {
    pub factory: UnitFactory,
    /// Libraries deployed while building this factory.
    pub redeployed: Vec<(String, Address)>,
}

/// Builds the deployable handle for `unit`. Units without link references use
/// their compiled bytecode directly and never touch the library resolver.
pub fn build_factory(
    unit: &str,
    artifacts: &dyn ArtifactSource,
    manifest: &mut Manifest,
    ledger: &dyn Ledger,
    confirmation_timeout: Duration,
) -> Result<BuiltFactory> {
    let artifact = artifacts.artifact(unit)?;
    if !artifact.has_link_references() {
        return Ok(BuiltFactory {
            factory: UnitFactory::new(unit, artifact.bytecode, artifact.abi),
            redeployed: Vec::new(),
        });
    }

    let resolved = resolve_libraries(
        &artifact,
        artifacts,
        manifest,
        ledger,
        confirmation_timeout,
    )?;
    Ok(BuiltFactory {
        factory: link_factory(&artifact, &resolved.bindings)?,
        redeployed: resolved.redeployed,
    })
}

/// Links `artifact` against `bindings`; every declared library must be bound.
pub fn link_factory(artifact: &Artifact, bindings: &LibraryBindingSet) -> Result<UnitFactory> {
    let bytecode = artifact
        .link(|library| bindings.get(library))
        .map_err(|library| UpgradeError::UnresolvedLink {
            unit: artifact.contract_name.clone(),
            library,
        })?;
    Ok(UnitFactory::new(
        artifact.contract_name.clone(),
        bytecode,
        artifact.abi.clone(),
    ))
}
