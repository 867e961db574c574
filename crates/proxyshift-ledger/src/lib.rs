#[cfg(any(test, feature = "test-support"))]
mod memory;
mod rpc;
mod types;
mod verify;

#[cfg(any(test, feature = "test-support"))]
pub use memory::{InMemoryLedger, Invocation, RecordingVerifier};
pub use rpc::{RpcLedger, EIP1967_IMPLEMENTATION_SLOT};
pub use types::{Ledger, Receipt, Submission, TxHash, Verifier};
pub use verify::{HttpVerifier, SkipVerification};

#[cfg(test)]
mod tests;
