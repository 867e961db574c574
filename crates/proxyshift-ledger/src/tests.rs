use std::time::Duration;

use mockito::Matcher;
use proxyshift_core::{Address, InterfaceDescriptor, LedgerError, UnitFactory, VerificationError};
use serde_json::json;

use crate::rpc::{parse_quantity, parse_receipt};
use crate::{
    HttpVerifier, InMemoryLedger, Ledger, RecordingVerifier, RpcLedger, SkipVerification,
    Submission, TxHash, Verifier,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn address(last: u8) -> Address {
    let mut bytes = [0_u8; 20];
    bytes[19] = last;
    Address::new(bytes)
}

fn factory(name: &str, bytecode: &[u8]) -> UnitFactory {
    UnitFactory::new(name, bytecode.to_vec(), InterfaceDescriptor::empty())
}

#[test]
fn prepare_upgrade_does_not_move_proxy() {
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(2));

    let prepared = ledger
        .prepare_upgrade(address(1), &factory("Nodes", &[0x60, 0x80]))
        .expect("prepare must succeed");

    assert_ne!(prepared, address(2));
    assert_eq!(ledger.proxy_implementation(address(1)), Some(address(2)));
    assert_eq!(ledger.prepare_calls(), 1);
}

#[test]
fn prepare_is_deterministic_per_bytecode() {
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(2));
    let nodes = factory("Nodes", &[0x60, 0x80]);

    let first = ledger.prepare_upgrade(address(1), &nodes).expect("prepare");
    let second = ledger.prepare_upgrade(address(1), &nodes).expect("prepare");
    assert_eq!(first, second);
    assert_eq!(first, InMemoryLedger::implementation_for(&nodes));
}

#[test]
fn upgrade_moves_proxy_after_confirmation() {
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(2));
    let nodes = factory("Nodes", &[0x60, 0x80]);

    let tx = ledger.upgrade_proxy(address(1), &nodes).expect("upgrade must submit");
    let receipt = ledger
        .wait_for_confirmation(&tx, TIMEOUT)
        .expect("upgrade must confirm");

    assert!(receipt.success);
    assert!(receipt.gas_used > 0);
    assert_eq!(
        ledger.implementation_address(address(1)).expect("read"),
        InMemoryLedger::implementation_for(&nodes)
    );
    assert_eq!(ledger.upgrades().len(), 1);
}

#[test]
fn rejected_upgrade_reverts_and_keeps_pointer() {
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(2));
    ledger.reject_upgrades_of(address(1));

    let tx = ledger
        .upgrade_proxy(address(1), &factory("Nodes", &[0x01]))
        .expect("upgrade must submit");
    let err = ledger
        .wait_for_confirmation(&tx, TIMEOUT)
        .expect_err("upgrade must revert");

    assert!(matches!(err, LedgerError::Reverted { .. }));
    assert_eq!(ledger.proxy_implementation(address(1)), Some(address(2)));
}

#[test]
fn stalled_upgrade_times_out() {
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(2));
    ledger.stall_upgrades_of(address(1));

    let tx = ledger
        .upgrade_proxy(address(1), &factory("Nodes", &[0x01]))
        .expect("upgrade must submit");
    let err = ledger
        .wait_for_confirmation(&tx, TIMEOUT)
        .expect_err("upgrade must time out");
    assert!(matches!(err, LedgerError::Timeout { waited_secs: 5, .. }));
}

#[test]
fn unknown_proxy_is_an_error() {
    let ledger = InMemoryLedger::new();
    assert!(ledger.implementation_address(address(9)).is_err());
    assert!(ledger
        .prepare_upgrade(address(9), &factory("Nodes", &[0x01]))
        .is_err());
}

#[test]
fn deploy_proxy_reports_new_address_in_receipt() {
    let ledger = InMemoryLedger::new();
    let wallets = factory("Wallets", &[0x60]);

    let tx = ledger
        .deploy_proxy(&wallets, &[json!(address(1).to_string())])
        .expect("deploy must submit");
    let receipt = ledger.wait_for_confirmation(&tx, TIMEOUT).expect("confirm");
    let proxy = receipt.contract_address.expect("proxy address");

    assert_eq!(
        ledger.implementation_address(proxy).expect("read"),
        InMemoryLedger::implementation_for(&wallets)
    );
    let deployments = ledger.proxy_deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].0, "Wallets");
    assert_eq!(deployments[0].2, vec![json!(address(1).to_string())]);
}

#[test]
fn recording_verifier_records_rejected_submissions() {
    let verifier = RecordingVerifier::rejecting();
    assert!(verifier.verify("Nodes", address(3)).is_err());
    assert_eq!(verifier.submissions(), vec![("Nodes".to_string(), address(3))]);
}

#[test]
fn parses_receipt_fields() {
    let tx = TxHash("0xabc".to_string());
    let receipt = parse_receipt(
        &tx,
        &json!({
            "gasUsed": "0x5208",
            "status": "0x1",
            "contractAddress": "0x0000000000000000000000000000000000000007"
        }),
    )
    .expect("receipt must parse");
    assert_eq!(receipt.gas_used, 21_000);
    assert!(receipt.success);
    assert_eq!(receipt.contract_address, Some(address(7)));

    let failed = parse_receipt(&tx, &json!({"status": "0x0", "contractAddress": null}))
        .expect("receipt must parse");
    assert!(!failed.success);
    assert!(failed.contract_address.is_none());

    assert!(parse_quantity("0xzz").is_err());
}

#[test]
fn rpc_ledger_reads_eip1967_slot() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getStorageAt"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x0000000000000000000000000000000000000000000000000000000000000005"
            })
            .to_string(),
        )
        .create();

    let ledger = RpcLedger::new(server.url()).expect("client must build");
    let implementation = ledger
        .implementation_address(address(1))
        .expect("slot must decode");

    assert_eq!(implementation, address(5));
    mock.assert();
}

#[test]
fn rpc_ledger_surfaces_node_errors() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "storage layout is incompatible"}
            })
            .to_string(),
        )
        .create();

    let ledger = RpcLedger::new(server.url()).expect("client must build");
    let err = ledger
        .prepare_upgrade(address(1), &factory("Nodes", &[0x60]))
        .expect_err("node error must surface");

    assert!(matches!(
        err,
        LedgerError::Rpc { ref method, code: -32000, .. } if method == "upgrades_prepareUpgrade"
    ));
}

#[test]
fn rpc_ledger_rejects_empty_implementation_slot() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x0"}).to_string())
        .create();

    let ledger = RpcLedger::new(server.url()).expect("client must build");
    let err = ledger
        .implementation_address(address(1))
        .expect_err("zero slot is not a proxy");
    assert!(matches!(err, LedgerError::InvalidResponse(_)));
}

#[test]
fn rpc_ledger_wait_returns_mined_receipt() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(
            json!({"method": "eth_getTransactionReceipt"}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"gasUsed": "0x10", "status": "0x1", "contractAddress": null}
            })
            .to_string(),
        )
        .create();

    let ledger = RpcLedger::new(server.url())
        .expect("client must build")
        .with_poll_interval(Duration::from_millis(10));
    let receipt = ledger
        .wait_for_confirmation(&TxHash("0x01".to_string()), TIMEOUT)
        .expect("receipt must be returned");
    assert_eq!(receipt.gas_used, 16);
}

#[test]
fn http_verifier_posts_unit_address_and_network() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/verify")
        .match_body(Matcher::Json(json!({
            "contract": "Nodes",
            "address": address(3).to_string(),
            "network": "mainnet"
        })))
        .with_status(200)
        .create();

    let verifier = HttpVerifier::new(format!("{}/verify", server.url()), "mainnet")
        .expect("client must build");
    let submission = verifier
        .verify("Nodes", address(3))
        .expect("submission must be accepted");
    assert_eq!(submission, Submission::Submitted);
    mock.assert();
}

#[test]
fn skip_verification_reports_nothing_was_sent() {
    let submission = SkipVerification
        .verify("Nodes", address(3))
        .expect("skipping never fails");
    assert_eq!(submission, Submission::Skipped);
}

#[test]
fn http_verifier_reports_rejection() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/verify")
        .with_status(409)
        .with_body("already verified")
        .create();

    let verifier = HttpVerifier::new(format!("{}/verify", server.url()), "mainnet")
        .expect("client must build");
    let err = verifier
        .verify("Nodes", address(3))
        .expect_err("conflict must be reported");
    assert!(matches!(
        err,
        VerificationError::Rejected { ref reason, .. } if reason.contains("already verified")
    ));
}
