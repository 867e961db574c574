use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ABI-equivalent description of a unit's callable surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceDescriptor(Value);

impl InterfaceDescriptor {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(Value::Array(Vec::new()))
    }

    /// Names of the `function` entries, in declaration order.
    pub fn entry_points(&self) -> Vec<&str> {
        let Some(items) = self.0.as_array() else {
            return Vec::new();
        };
        items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("function"))
            .filter_map(|item| item.get("name").and_then(Value::as_str))
            .collect()
    }

    pub fn has_entry_point(&self, name: &str) -> bool {
        self.entry_points().contains(&name)
    }
}

/// Deployable handle for a unit: fully linked bytecode plus its interface.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFactory {
    pub name: String,
    pub bytecode: Vec<u8>,
    pub interface: InterfaceDescriptor,
}

impl UnitFactory {
    pub fn new(name: impl Into<String>, bytecode: Vec<u8>, interface: InterfaceDescriptor) -> Self {
        Self {
            name: name.into(),
            bytecode,
            interface,
        }
    }
}
