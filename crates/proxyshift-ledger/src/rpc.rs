use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use proxyshift_core::{Address, LedgerError, UnitFactory};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::{Ledger, Receipt, TxHash};

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const EIP1967_IMPLEMENTATION_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 ledger client. Standard `eth_*` methods are used for reads
/// and receipts; upgrade-plugin operations go through the node's
/// `upgrades_*` namespace.
#[derive(Debug)]
pub struct RpcLedger {
    url: String,
    client: Client,
    next_id: AtomicU64,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .build()
            .map_err(|err| LedgerError::Transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| LedgerError::Transport(format!("{method}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("{method}: http status {status}")));
        }

        let envelope: RpcResponse = response
            .json()
            .map_err(|err| LedgerError::InvalidResponse(format!("{method}: {err}")))?;
        if let Some(error) = envelope.error {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn send(&self, method: &str, params: Value) -> Result<TxHash, LedgerError> {
        let result = self.call(method, params)?;
        let hash = result
            .as_str()
            .ok_or_else(|| {
                LedgerError::InvalidResponse(format!("{method}: expected transaction hash"))
            })?
            .to_string();
        debug!(method, tx = %hash, "transaction submitted");
        Ok(TxHash(hash))
    }
}

impl Ledger for RpcLedger {
    fn implementation_address(&self, proxy: Address) -> Result<Address, LedgerError> {
        let result = self.call(
            "eth_getStorageAt",
            json!([proxy.to_string(), EIP1967_IMPLEMENTATION_SLOT, "latest"]),
        )?;
        let word = parse_word(&result)?;
        let implementation = Address::from_word(&word);
        if implementation.is_zero() {
            return Err(LedgerError::InvalidResponse(format!(
                "{proxy} has no implementation in the EIP-1967 slot"
            )));
        }
        Ok(implementation)
    }

    fn prepare_upgrade(
        &self,
        proxy: Address,
        factory: &UnitFactory,
    ) -> Result<Address, LedgerError> {
        let result = self.call(
            "upgrades_prepareUpgrade",
            json!([proxy.to_string(), factory_payload(factory)]),
        )?;
        parse_address("upgrades_prepareUpgrade", &result)
    }

    fn upgrade_proxy(&self, proxy: Address, factory: &UnitFactory) -> Result<TxHash, LedgerError> {
        self.send(
            "upgrades_upgradeProxy",
            json!([proxy.to_string(), factory_payload(factory)]),
        )
    }

    fn deploy_proxy(
        &self,
        factory: &UnitFactory,
        init_args: &[Value],
    ) -> Result<TxHash, LedgerError> {
        self.send(
            "upgrades_deployProxy",
            json!([factory_payload(factory), init_args]),
        )
    }

    fn deploy(&self, factory: &UnitFactory) -> Result<TxHash, LedgerError> {
        self.send("upgrades_deploy", json!([factory_payload(factory)]))
    }

    fn invoke(
        &self,
        target: Address,
        entry_point: &str,
        args: &[Value],
    ) -> Result<TxHash, LedgerError> {
        self.send(
            "upgrades_invoke",
            json!([target.to_string(), entry_point, args]),
        )
    }

    fn wait_for_confirmation(
        &self,
        tx: &TxHash,
        timeout: Duration,
    ) -> Result<Receipt, LedgerError> {
        let started = Instant::now();
        loop {
            let result = self.call("eth_getTransactionReceipt", json!([tx.0]))?;
            if !result.is_null() {
                let receipt = parse_receipt(tx, &result)?;
                if !receipt.success {
                    return Err(LedgerError::Reverted { tx: tx.0.clone() });
                }
                return Ok(receipt);
            }

            if started.elapsed() >= timeout {
                return Err(LedgerError::Timeout {
                    tx: tx.0.clone(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            thread::sleep(self.poll_interval.min(timeout.saturating_sub(started.elapsed())));
        }
    }
}

fn factory_payload(factory: &UnitFactory) -> Value {
    json!({
        "name": factory.name,
        "bytecode": format!("0x{}", hex::encode(&factory.bytecode)),
        "abi": factory.interface,
    })
}

fn parse_address(method: &str, value: &Value) -> Result<Address, LedgerError> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::InvalidResponse(format!("{method}: expected address")))?
        .parse()
        .map_err(|err| LedgerError::InvalidResponse(format!("{method}: {err}")))
}

fn parse_word(value: &Value) -> Result<[u8; 32], LedgerError> {
    let raw = value
        .as_str()
        .ok_or_else(|| LedgerError::InvalidResponse("storage word must be a string".to_string()))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let padded = format!("{digits:0>64}");
    let mut word = [0_u8; 32];
    hex::decode_to_slice(&padded, &mut word)
        .map_err(|err| LedgerError::InvalidResponse(format!("invalid storage word {raw}: {err}")))?;
    Ok(word)
}

pub(crate) fn parse_quantity(raw: &str) -> Result<u64, LedgerError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|err| LedgerError::InvalidResponse(format!("invalid quantity {raw}: {err}")))
}

pub(crate) fn parse_receipt(tx: &TxHash, value: &Value) -> Result<Receipt, LedgerError> {
    let gas_used = match value.get("gasUsed").and_then(Value::as_str) {
        Some(raw) => parse_quantity(raw)?,
        None => 0,
    };
    let contract_address = match value.get("contractAddress") {
        Some(Value::String(raw)) => Some(
            raw.parse()
                .map_err(|err| LedgerError::InvalidResponse(format!("contractAddress: {err}")))?,
        ),
        _ => None,
    };
    let success = match value.get("status").and_then(Value::as_str) {
        Some(raw) => parse_quantity(raw)? == 1,
        None => true,
    };

    Ok(Receipt {
        tx_hash: tx.clone(),
        gas_used,
        contract_address,
        success,
    })
}
