use std::fmt;
use std::time::Duration;

use proxyshift_core::{Address, LedgerError, UnitFactory, VerificationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub success: bool,
}

/// Ledger/runtime collaborator. Every call blocks until the node answers;
/// state-changing calls return a transaction to be confirmed with
/// [`Ledger::wait_for_confirmation`].
pub trait Ledger {
    /// Implementation the proxy currently delegates to.
    fn implementation_address(&self, proxy: Address) -> Result<Address, LedgerError>;

    /// Implementation address an upgrade to `factory` would point the proxy at.
    /// Never changes which implementation the proxy uses.
    fn prepare_upgrade(&self, proxy: Address, factory: &UnitFactory)
        -> Result<Address, LedgerError>;

    fn upgrade_proxy(&self, proxy: Address, factory: &UnitFactory) -> Result<TxHash, LedgerError>;

    /// Deploys an implementation behind a new proxy, initialised with `init_args`.
    fn deploy_proxy(&self, factory: &UnitFactory, init_args: &[Value])
        -> Result<TxHash, LedgerError>;

    /// Plain deployment, used for libraries.
    fn deploy(&self, factory: &UnitFactory) -> Result<TxHash, LedgerError>;

    fn invoke(&self, target: Address, entry_point: &str, args: &[Value])
        -> Result<TxHash, LedgerError>;

    /// Blocks until the transaction is mined. A reverted transaction is an error.
    fn wait_for_confirmation(&self, tx: &TxHash, timeout: Duration)
        -> Result<Receipt, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Submitted,
    /// Nothing was sent, e.g. because no endpoint is configured.
    Skipped,
}

/// Source verification collaborator. Failures are never fatal to a run.
pub trait Verifier {
    fn verify(&self, unit: &str, address: Address) -> Result<Submission, VerificationError>;
}
