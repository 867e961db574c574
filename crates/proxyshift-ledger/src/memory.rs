use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use proxyshift_core::{Address, LedgerError, UnitFactory, VerificationError};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Ledger, Receipt, Submission, TxHash, Verifier};

const BASE_GAS: u64 = 21_000;
const GAS_PER_BYTE: u64 = 200;
const INVOKE_GAS: u64 = 48_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: Address,
    pub entry_point: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
struct State {
    nonce: u64,
    proxies: BTreeMap<Address, Address>,
    receipts: BTreeMap<String, Receipt>,
    stalled_txs: BTreeSet<String>,
    rejected_proxies: BTreeSet<Address>,
    stalled_proxies: BTreeSet<Address>,
    deployments: Vec<(String, Address)>,
    proxy_deployments: Vec<(String, Address, Vec<Value>)>,
    upgrades: Vec<(Address, Address)>,
    invocations: Vec<Invocation>,
    prepare_calls: usize,
}

impl State {
    fn next_address(&mut self) -> Address {
        self.nonce += 1;
        derive_address(b"contract", &self.nonce.to_be_bytes())
    }

    fn record(&mut self, gas_used: u64, contract_address: Option<Address>, success: bool) -> TxHash {
        self.nonce += 1;
        let hash = TxHash(format!("0x{:064x}", self.nonce));
        self.receipts.insert(
            hash.0.clone(),
            Receipt {
                tx_hash: hash.clone(),
                gas_used,
                contract_address,
                success,
            },
        );
        hash
    }
}

/// Deterministic in-process ledger. Implementation addresses are derived from
/// bytecode, so preparing the same factory twice yields the same address.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RefCell<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address `prepare_upgrade` reports for `factory`.
    pub fn implementation_for(factory: &UnitFactory) -> Address {
        derive_address(b"implementation", &factory.bytecode)
    }

    pub fn add_proxy(&self, proxy: Address, implementation: Address) {
        self.state.borrow_mut().proxies.insert(proxy, implementation);
    }

    /// Upgrade transactions for `proxy` are mined but revert.
    pub fn reject_upgrades_of(&self, proxy: Address) {
        self.state.borrow_mut().rejected_proxies.insert(proxy);
    }

    /// Upgrade transactions for `proxy` are never confirmed.
    pub fn stall_upgrades_of(&self, proxy: Address) {
        self.state.borrow_mut().stalled_proxies.insert(proxy);
    }

    pub fn proxy_implementation(&self, proxy: Address) -> Option<Address> {
        self.state.borrow().proxies.get(&proxy).copied()
    }

    pub fn upgrades(&self) -> Vec<(Address, Address)> {
        self.state.borrow().upgrades.clone()
    }

    pub fn deployments(&self) -> Vec<(String, Address)> {
        self.state.borrow().deployments.clone()
    }

    pub fn proxy_deployments(&self) -> Vec<(String, Address, Vec<Value>)> {
        self.state.borrow().proxy_deployments.clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.borrow().invocations.clone()
    }

    pub fn prepare_calls(&self) -> usize {
        self.state.borrow().prepare_calls
    }

    fn known_proxy(&self, proxy: Address) -> Result<Address, LedgerError> {
        self.state
            .borrow()
            .proxies
            .get(&proxy)
            .copied()
            .ok_or_else(|| LedgerError::Rpc {
                method: "implementation".to_string(),
                code: -32000,
                message: format!("{proxy} is not a registered proxy"),
            })
    }
}

impl Ledger for InMemoryLedger {
    fn implementation_address(&self, proxy: Address) -> Result<Address, LedgerError> {
        self.known_proxy(proxy)
    }

    fn prepare_upgrade(
        &self,
        proxy: Address,
        factory: &UnitFactory,
    ) -> Result<Address, LedgerError> {
        self.known_proxy(proxy)?;
        self.state.borrow_mut().prepare_calls += 1;
        Ok(Self::implementation_for(factory))
    }

    fn upgrade_proxy(&self, proxy: Address, factory: &UnitFactory) -> Result<TxHash, LedgerError> {
        self.known_proxy(proxy)?;
        let implementation = Self::implementation_for(factory);
        let gas = BASE_GAS + GAS_PER_BYTE * factory.bytecode.len() as u64;

        let mut state = self.state.borrow_mut();
        if state.rejected_proxies.contains(&proxy) {
            return Ok(state.record(gas, None, false));
        }
        if state.stalled_proxies.contains(&proxy) {
            let hash = state.record(gas, None, true);
            state.stalled_txs.insert(hash.0.clone());
            return Ok(hash);
        }

        state.proxies.insert(proxy, implementation);
        state.upgrades.push((proxy, implementation));
        Ok(state.record(gas, None, true))
    }

    fn deploy_proxy(
        &self,
        factory: &UnitFactory,
        init_args: &[Value],
    ) -> Result<TxHash, LedgerError> {
        let implementation = Self::implementation_for(factory);
        let gas = BASE_GAS + GAS_PER_BYTE * factory.bytecode.len() as u64;

        let mut state = self.state.borrow_mut();
        let proxy = state.next_address();
        state.proxies.insert(proxy, implementation);
        state
            .proxy_deployments
            .push((factory.name.clone(), proxy, init_args.to_vec()));
        Ok(state.record(gas, Some(proxy), true))
    }

    fn deploy(&self, factory: &UnitFactory) -> Result<TxHash, LedgerError> {
        let gas = BASE_GAS + GAS_PER_BYTE * factory.bytecode.len() as u64;

        let mut state = self.state.borrow_mut();
        let address = state.next_address();
        state.deployments.push((factory.name.clone(), address));
        Ok(state.record(gas, Some(address), true))
    }

    fn invoke(
        &self,
        target: Address,
        entry_point: &str,
        args: &[Value],
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.state.borrow_mut();
        state.invocations.push(Invocation {
            target,
            entry_point: entry_point.to_string(),
            args: args.to_vec(),
        });
        Ok(state.record(INVOKE_GAS, None, true))
    }

    fn wait_for_confirmation(
        &self,
        tx: &TxHash,
        timeout: Duration,
    ) -> Result<Receipt, LedgerError> {
        let state = self.state.borrow();
        if state.stalled_txs.contains(&tx.0) {
            return Err(LedgerError::Timeout {
                tx: tx.0.clone(),
                waited_secs: timeout.as_secs(),
            });
        }

        let receipt = state
            .receipts
            .get(&tx.0)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("unknown transaction {tx}")))?;
        if !receipt.success {
            return Err(LedgerError::Reverted { tx: tx.0.clone() });
        }
        Ok(receipt)
    }
}

/// Records every submission; optionally rejects them all.
#[derive(Debug, Default)]
pub struct RecordingVerifier {
    submissions: RefCell<Vec<(String, Address)>>,
    reject: bool,
}

impl RecordingVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            submissions: RefCell::new(Vec::new()),
            reject: true,
        }
    }

    pub fn submissions(&self) -> Vec<(String, Address)> {
        self.submissions.borrow().clone()
    }
}

impl Verifier for RecordingVerifier {
    fn verify(&self, unit: &str, address: Address) -> Result<Submission, VerificationError> {
        self.submissions
            .borrow_mut()
            .push((unit.to_string(), address));
        if self.reject {
            return Err(VerificationError::Rejected {
                unit: unit.to_string(),
                address: address.to_string(),
                reason: "already verified or source mismatch".to_string(),
            });
        }
        Ok(Submission::Submitted)
    }
}

fn derive_address(domain: &[u8], data: &[u8]) -> Address {
    let digest = Sha256::new().chain_update(domain).chain_update(data).finalize();
    let mut bytes = [0_u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::new(bytes)
}
