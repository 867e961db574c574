use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Address, InterfaceDescriptor, Result, UpgradeError};

/// Proxy-fronted unit as recorded in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<InterfaceDescriptor>,
}

/// Separately deployed library as recorded in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_bytecode: Option<String>,
}

/// Durable state of record for a deployment: unit and library addresses,
/// interface descriptors and library bytecode hashes. Unknown keys are
/// rejected so a manifest in another layout never loads as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub units: BTreeMap<String, UnitRecord>,
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryRecord>,
}

impl Manifest {
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|err| UpgradeError::Manifest(format!("failed to parse manifest: {err}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| UpgradeError::io(path, err))?;
        Self::from_json_str(&raw).map_err(|err| match err {
            UpgradeError::Manifest(message) => {
                UpgradeError::Manifest(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Pretty JSON with four-space indentation and a trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .map_err(|err| UpgradeError::Manifest(format!("failed to serialize manifest: {err}")))?;
        buffer.push(b'\n');
        String::from_utf8(buffer)
            .map_err(|err| UpgradeError::Manifest(format!("manifest is not utf-8: {err}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| UpgradeError::io(parent, err))?;
        }
        fs::write(path, self.to_json_string()?).map_err(|err| UpgradeError::io(path, err))
    }

    pub fn unit(&self, key: &str) -> Option<&UnitRecord> {
        self.units.get(key)
    }

    pub fn unit_address(&self, key: &str) -> Option<Address> {
        self.units.get(key).and_then(|record| record.address)
    }

    pub fn library(&self, name: &str) -> Option<&LibraryRecord> {
        self.libraries.get(name)
    }

    pub fn set_unit_address(&mut self, key: &str, address: Address) {
        self.units.entry(key.to_string()).or_default().address = Some(address);
    }

    pub fn set_unit_interface(&mut self, key: &str, interface: InterfaceDescriptor) {
        self.units.entry(key.to_string()).or_default().abi = Some(interface);
    }

    pub fn record_library(&mut self, name: &str, address: Address, hashed_bytecode: String) {
        let record = self.libraries.entry(name.to_string()).or_default();
        record.address = Some(address);
        record.hashed_bytecode = Some(hashed_bytecode);
    }

    /// Units that have a proxy address but no interface descriptor.
    pub fn units_missing_interface(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|(_, record)| record.address.is_some() && record.abi.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
