use std::collections::BTreeMap;

use proxyshift_core::{Address, ArtifactError, InterfaceDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::bytecode_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// Source file -> library name -> byte offsets of the address placeholders.
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>;

/// Compiler output for one unit or library.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: InterfaceDescriptor,
    pub bytecode: Vec<u8>,
    pub link_references: LinkReferences,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: String,
    #[serde(default)]
    abi: Value,
    bytecode: String,
    #[serde(default)]
    link_references: LinkReferences,
}

impl Artifact {
    pub fn new(
        contract_name: impl Into<String>,
        abi: InterfaceDescriptor,
        bytecode: Vec<u8>,
        link_references: LinkReferences,
    ) -> Result<Self, ArtifactError> {
        let contract_name = contract_name.into();
        validate_offsets(&contract_name, bytecode.len(), &link_references)?;
        Ok(Self {
            contract_name,
            abi,
            bytecode,
            link_references,
        })
    }

    pub fn from_json_str(input: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(input).map_err(|err| ArtifactError::Parse {
            name: "<unknown>".to_string(),
            message: err.to_string(),
        })?;
        let bytecode = decode_unlinked(&raw.contract_name, &raw.bytecode, &raw.link_references)?;
        let abi = match raw.abi {
            Value::Null => InterfaceDescriptor::empty(),
            other => InterfaceDescriptor::new(other),
        };
        Self::new(raw.contract_name, abi, bytecode, raw.link_references)
    }

    pub fn has_link_references(&self) -> bool {
        self.link_references.values().any(|libraries| !libraries.is_empty())
    }

    /// Declared libraries, each listed once, ordered by source file and then
    /// by library name.
    pub fn library_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for libraries in self.link_references.values() {
            for name in libraries.keys() {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn bytecode_hash(&self) -> String {
        bytecode_hash(&self.bytecode)
    }

    /// Writes resolved library addresses into every placeholder. Returns the
    /// name of the first library `resolve` has no address for.
    pub fn link<F>(&self, resolve: F) -> Result<Vec<u8>, String>
    where
        F: Fn(&str) -> Option<Address>,
    {
        let mut linked = self.bytecode.clone();
        for libraries in self.link_references.values() {
            for (library, offsets) in libraries {
                let address = resolve(library).ok_or_else(|| library.clone())?;
                for offset in offsets {
                    linked[offset.start..offset.start + offset.length]
                        .copy_from_slice(address.as_bytes());
                }
            }
        }
        Ok(linked)
    }
}

fn validate_offsets(
    name: &str,
    bytecode_len: usize,
    link_references: &LinkReferences,
) -> Result<(), ArtifactError> {
    for libraries in link_references.values() {
        for (library, offsets) in libraries {
            for offset in offsets {
                let in_range = offset
                    .start
                    .checked_add(offset.length)
                    .is_some_and(|end| end <= bytecode_len);
                if offset.length != Address::LEN || !in_range {
                    return Err(ArtifactError::LinkOutOfRange {
                        name: name.to_string(),
                        library: library.clone(),
                        start: offset.start,
                        length: offset.length,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Hex-decodes bytecode whose placeholder regions are not valid hex yet.
fn decode_unlinked(
    name: &str,
    raw: &str,
    link_references: &LinkReferences,
) -> Result<Vec<u8>, ArtifactError> {
    let digits = raw.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    if digits.len() % 2 != 0 {
        return Err(ArtifactError::InvalidBytecode {
            name: name.to_string(),
            message: format!("odd number of hex characters ({})", digits.len()),
        });
    }

    let mut chars = digits.as_bytes().to_vec();
    for libraries in link_references.values() {
        for (library, offsets) in libraries {
            for offset in offsets {
                let range = offset.start.checked_mul(2).and_then(|start| {
                    offset
                        .start
                        .checked_add(offset.length)
                        .and_then(|end| end.checked_mul(2))
                        .filter(|end| *end <= chars.len())
                        .map(|end| start..end)
                });
                let Some(range) = range else {
                    return Err(ArtifactError::LinkOutOfRange {
                        name: name.to_string(),
                        library: library.clone(),
                        start: offset.start,
                        length: offset.length,
                    });
                };
                chars[range].fill(b'0');
            }
        }
    }

    hex::decode(&chars).map_err(|err| ArtifactError::InvalidBytecode {
        name: name.to_string(),
        message: err.to_string(),
    })
}
