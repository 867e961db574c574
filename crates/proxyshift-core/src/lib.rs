mod address;
mod config;
mod error;
mod factory;
mod manifest;

pub use address::{Address, AddressParseError};
pub use config::{
    AliasTable, DeployMode, InitializeSpec, LedgerSettings, UnitSpec, UpgradeConfig,
    VerificationSettings,
};
pub use error::{ArtifactError, LedgerError, Result, UpgradeError, VerificationError};
pub use factory::{InterfaceDescriptor, UnitFactory};
pub use manifest::{LibraryRecord, Manifest, UnitRecord};
