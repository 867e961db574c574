use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, UpgradeError};

const DEFAULT_REGISTRY_ENTRY_POINT: &str = "setContractsAddress";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    #[default]
    Upgrade,
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    #[serde(default)]
    pub mode: DeployMode,
    #[serde(default)]
    pub optional: bool,
}

impl UnitSpec {
    pub fn upgrade(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: DeployMode::Upgrade,
            optional: false,
        }
    }

    pub fn fresh(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: DeployMode::Fresh,
            optional: false,
        }
    }
}

/// Maps a unit name to the manifest key it is recorded under, for units that
/// superseded an older one while keeping its proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, String>);

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, unit: impl Into<String>, key: impl Into<String>) -> Self {
        self.0.insert(unit.into(), key.into());
        self
    }

    pub fn manifest_key<'a>(&'a self, unit: &'a str) -> &'a str {
        self.0.get(unit).map(String::as_str).unwrap_or(unit)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeSpec {
    pub unit: String,
    pub entry_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSettings {
    pub endpoint: String,
}

/// Run configuration for one migration, usually read from `proxyshift.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub product: String,
    pub network: String,
    pub registry: String,
    #[serde(default = "default_registry_entry_point")]
    pub registry_entry_point: String,
    pub expected_deployed_version: String,
    #[serde(default = "default_deployed_version_file")]
    pub deployed_version_file: PathBuf,
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default)]
    pub aliases: AliasTable,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub initialize: Option<InitializeSpec>,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub verification: Option<VerificationSettings>,
}

impl UpgradeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|err| {
            UpgradeError::Configuration(format!("failed to parse upgrade config: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.product.trim().is_empty() {
            return Err(UpgradeError::Configuration(
                "product must not be empty".to_string(),
            ));
        }
        if self.network.trim().is_empty() {
            return Err(UpgradeError::Configuration(
                "network must not be empty".to_string(),
            ));
        }
        if self.registry.trim().is_empty() {
            return Err(UpgradeError::Configuration(
                "registry unit must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for unit in &self.units {
            if unit.name.trim().is_empty() {
                return Err(UpgradeError::Configuration(
                    "unit name must not be empty".to_string(),
                ));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(UpgradeError::Configuration(format!(
                    "duplicate unit declaration '{}'",
                    unit.name
                )));
            }
            if unit.name == self.registry && unit.mode == DeployMode::Fresh {
                return Err(UpgradeError::Configuration(format!(
                    "registry unit '{}' must be upgraded, not deployed fresh",
                    unit.name
                )));
            }
        }

        for (unit, key) in &self.aliases.0 {
            if unit == key {
                return Err(UpgradeError::Configuration(format!(
                    "alias for '{unit}' points to itself"
                )));
            }
        }

        if let Some(initialize) = &self.initialize {
            if initialize.entry_point.trim().is_empty() {
                return Err(UpgradeError::Configuration(format!(
                    "initialize entry point for '{}' must not be empty",
                    initialize.unit
                )));
            }
            let is_fresh = self
                .units
                .iter()
                .any(|unit| unit.name == initialize.unit && unit.mode == DeployMode::Fresh);
            if is_fresh {
                return Err(UpgradeError::Configuration(format!(
                    "initialize unit '{}' must already be deployed",
                    initialize.unit
                )));
            }
        }

        Ok(())
    }

    /// Units to plan, registry first, fresh units excluded.
    pub fn planning_order(&self) -> Vec<UnitSpec> {
        let registry = self
            .units
            .iter()
            .find(|unit| unit.name == self.registry)
            .cloned()
            .unwrap_or_else(|| UnitSpec::upgrade(self.registry.clone()));

        let mut ordered = vec![registry];
        ordered.extend(
            self.units
                .iter()
                .filter(|unit| unit.name != self.registry && unit.mode == DeployMode::Upgrade)
                .cloned(),
        );
        ordered
    }

    pub fn fresh_units(&self) -> Vec<UnitSpec> {
        self.units
            .iter()
            .filter(|unit| unit.mode == DeployMode::Fresh)
            .cloned()
            .collect()
    }

    /// Resolves relative file locations against `base`, normally the directory
    /// holding the config file.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for path in [
            &mut self.deployed_version_file,
            &mut self.version_file,
            &mut self.output_dir,
            &mut self.artifacts_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// `<product>-<version>-<network>-abi.json` inside the output directory.
    pub fn output_manifest_path(&self, version: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{}-{}-abi.json",
            self.product, version, self.network
        ))
    }
}

fn default_registry_entry_point() -> String {
    DEFAULT_REGISTRY_ENTRY_POINT.to_string()
}

fn default_deployed_version_file() -> PathBuf {
    PathBuf::from("DEPLOYED")
}

fn default_version_file() -> PathBuf {
    PathBuf::from("VERSION")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}
