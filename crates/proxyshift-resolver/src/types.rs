use std::collections::BTreeMap;

use proxyshift_core::Address;

/// Library name -> address used to link one unit. Built per unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryBindingSet {
    bindings: BTreeMap<String, Address>,
}

impl LibraryBindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing and returning any previous address.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) -> Option<Address> {
        self.bindings.insert(name.into(), address)
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryStatus {
    /// Compiled bytecode hash matches the manifest; reuse the recorded address.
    Current { address: Option<Address> },
    /// Source changed (or was never recorded); a fresh deployment is needed.
    Stale {
        current_hash: String,
        recorded_hash: Option<String>,
    },
}

impl LibraryStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLibraries {
    pub bindings: LibraryBindingSet,
    pub redeployed: Vec<(String, Address)>,
}
