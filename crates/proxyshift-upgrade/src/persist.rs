use std::fs;
use std::path::{Path, PathBuf};

use proxyshift_core::{Manifest, Result, UpgradeConfig, UpgradeError};
use tracing::debug;

/// Reads a single-line version marker, trimmed.
pub fn read_version_marker(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|err| UpgradeError::io(path, err))?;
    let version = raw.trim();
    if version.is_empty() {
        return Err(UpgradeError::Configuration(format!(
            "version marker {} is empty",
            path.display()
        )));
    }
    Ok(version.to_string())
}

/// Refuses to run against a deployment this migration was not written for.
pub fn ensure_deployed_version(path: &Path, expected: &str) -> Result<()> {
    let found = read_version_marker(path)?;
    if found != expected {
        return Err(UpgradeError::NotRelevant {
            expected: expected.to_string(),
            found,
        });
    }
    debug!(version = %found, "deployed version matches");
    Ok(())
}

/// Stamps `manifest` with the release version and network, then writes it to
/// its deterministic output location.
pub fn write_output_manifest(manifest: &mut Manifest, config: &UpgradeConfig) -> Result<PathBuf> {
    let version = read_version_marker(&config.version_file)?;
    let path = config.output_manifest_path(&version);
    manifest.version = Some(version);
    manifest.network = Some(config.network.clone());
    manifest.save(&path)?;
    Ok(path)
}
