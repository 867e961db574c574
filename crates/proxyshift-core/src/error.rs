use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = UpgradeError> = std::result::Result<T, E>;

/// Fatal conditions of an upgrade run. Everything except verification aborts the run.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Upgrade script is not relevant (expected deployed version '{expected}', found '{found}')")]
    NotRelevant { expected: String, found: String },

    #[error("library '{library}' required by '{unit}' has no resolvable address")]
    MissingDependency { unit: String, library: String },

    #[error("link reference '{library}' in '{unit}' is not present in the library bindings")]
    UnresolvedLink { unit: String, library: String },

    #[error("unit '{0}' has no proxy address in the manifest")]
    UnknownUnit(String),

    #[error("{0} address was not found in the manifest")]
    RequiredUnitMissing(String),

    #[error("transaction for '{unit}' failed")]
    Transaction {
        unit: String,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpgradeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transaction(unit: impl Into<String>, source: LedgerError) -> Self {
        Self::Transaction {
            unit: unit.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport failed: {0}")]
    Transport(String),

    #[error("ledger call '{method}' returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("transaction {tx} was reverted")]
    Reverted { tx: String },

    #[error("transaction {tx} was not confirmed within {waited_secs}s")]
    Timeout { tx: String, waited_secs: u64 },

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// Source verification is best-effort; callers log this and continue.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("verification request failed: {0}")]
    Transport(String),

    #[error("verification of '{unit}' at {address} was rejected: {reason}")]
    Rejected {
        unit: String,
        address: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("failed to parse artifact '{name}': {message}")]
    Parse { name: String, message: String },

    #[error("artifact '{name}' has invalid bytecode: {message}")]
    InvalidBytecode { name: String, message: String },

    #[error("link reference for '{library}' in '{name}' is out of range (offset {start}, length {length})")]
    LinkOutOfRange {
        name: String,
        library: String,
        start: usize,
        length: usize,
    },

    #[error("failed to read artifacts at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
