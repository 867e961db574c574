use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use proxyshift_artifacts::{Artifact, LinkReferences};
use proxyshift_core::{Address, InterfaceDescriptor, Manifest, UpgradeConfig};
use proxyshift_ledger::{InMemoryLedger, RecordingVerifier};
use proxyshift_upgrade::{ExecutionMode, UpgradeEvent, UpgradeReport};
use serde_json::json;
use tempfile::TempDir;

use crate::completion::{write_completions_script, CliCompletionShell};
use crate::flows::{execute_run, load_upgrade_config, run_upgrade_command};
use crate::render::{format_report_lines, render_status_line, resolve_output_style, OutputStyle};
use crate::{Cli, Commands, UpgradeArgs};

const CONFIG: &str = r#"
product = "skale-manager"
network = "mainnet"
registry = "ContractManager"
expected_deployed_version = "1.7.2-stable.0"

[[units]]
name = "ContractManager"

[[units]]
name = "Wallets"
mode = "fresh"

[initialize]
unit = "ContractManager"
entry_point = "initialize"
"#;

fn address(last: u8) -> Address {
    let mut bytes = [0_u8; 20];
    bytes[19] = last;
    Address::new(bytes)
}

fn workspace(deployed: &str) -> (TempDir, UpgradeArgs) {
    let dir = tempfile::tempdir().expect("must create temp dir");
    fs::write(dir.path().join("proxyshift.toml"), CONFIG).expect("must write config");
    fs::write(dir.path().join("DEPLOYED"), deployed).expect("must write DEPLOYED");
    fs::write(dir.path().join("VERSION"), "1.8.0").expect("must write VERSION");
    let args = UpgradeArgs {
        config: dir.path().join("proxyshift.toml"),
        manifest: None,
        multisig: false,
        network: None,
        rpc_url: None,
    };
    (dir, args)
}

fn artifacts() -> BTreeMap<String, Artifact> {
    let abi = InterfaceDescriptor::new(json!([
        {"type": "function", "name": "initialize", "inputs": []}
    ]));
    let mut map = BTreeMap::new();
    for (name, code) in [("ContractManager", vec![0x60, 0x01]), ("Wallets", vec![0x60, 0x02])] {
        let artifact = Artifact::new(name, abi.clone(), code, LinkReferences::new())
            .expect("artifact must build");
        map.insert(name.to_string(), artifact);
    }
    map
}

fn manifest() -> Manifest {
    let mut manifest = Manifest::default();
    manifest.set_unit_address("ContractManager", address(1));
    manifest.set_unit_interface("ContractManager", InterfaceDescriptor::empty());
    manifest
}

#[test]
fn upgrade_command_parses_defaults() {
    let cli = Cli::try_parse_from(["proxyshift", "upgrade", "--manifest", "abi.json"])
        .expect("command must parse");

    match cli.command {
        Commands::Upgrade(args) => {
            assert_eq!(args.config, PathBuf::from("proxyshift.toml"));
            assert_eq!(args.manifest, Some(PathBuf::from("abi.json")));
            assert!(args.network.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(!cli.verbose);
}

#[test]
fn upgrade_command_accepts_overrides() {
    let cli = Cli::try_parse_from([
        "proxyshift",
        "upgrade",
        "--multisig",
        "--network",
        "holesky",
        "--rpc-url",
        "http://node:8545",
        "-v",
    ])
    .expect("command must parse");

    assert!(cli.verbose);
    match cli.command {
        Commands::Upgrade(args) => {
            assert!(args.multisig);
            assert_eq!(args.network.as_deref(), Some("holesky"));
            assert_eq!(args.rpc_url.as_deref(), Some("http://node:8545"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn manifest_and_multisig_read_environment() {
    let command = Cli::command();
    let upgrade = command
        .find_subcommand("upgrade")
        .expect("upgrade subcommand must exist");
    let env_of = |id: &str| {
        upgrade
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_env())
            .map(OsStr::to_os_string)
    };

    assert_eq!(env_of("manifest"), Some("ABI".into()));
    assert_eq!(env_of("multisig"), Some("MULTISIG".into()));
}

#[test]
fn completions_name_the_binary() {
    let mut out = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut out).expect("must write script");
    let script = String::from_utf8(out).expect("script must be utf-8");
    assert!(script.contains("proxyshift"));
    assert!(script.contains("upgrade"));
}

#[test]
fn output_style_respects_terminal_and_no_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "Contract Nodes is up to date"),
        "Contract Nodes is up to date"
    );
    let rich = render_status_line(OutputStyle::Rich, "warn", "verification failed");
    assert!(rich.contains("[WARN]"));
    assert!(rich.ends_with(" verification failed"));
}

#[test]
fn report_badges_distinguish_warnings_from_skipped_verification() {
    let mut report = UpgradeReport::new();
    report.push(UpgradeEvent::UnitSkipped {
        unit: "BountyV2".to_string(),
    });
    report.push(UpgradeEvent::VerificationSkipped {
        unit: "Nodes".to_string(),
        address: address(2),
    });
    report.push(UpgradeEvent::VerificationFailed {
        unit: "Wallets".to_string(),
        address: address(3),
        reason: "already verified".to_string(),
    });

    let lines = format_report_lines(&report, OutputStyle::Rich);
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("[WARN]") && lines[0].ends_with("BountyV2 is not in the manifest, skipped"));
    assert!(lines[1].starts_with("[SKIP]"));
    assert!(lines[1].ends_with(&format!("Verification of Nodes at {} skipped", address(2))));
    assert!(lines[2].contains("[WARN]"));
    assert!(!lines.iter().any(|line| line.contains("Submitted")));
}

#[test]
fn config_is_resolved_next_to_its_file_with_overrides() {
    let (dir, mut args) = workspace("1.7.2-stable.0");
    args.network = Some("holesky".to_string());
    args.rpc_url = Some("http://node:8545".to_string());

    let config = load_upgrade_config(&args).expect("config must load");
    assert_eq!(config.network, "holesky");
    assert_eq!(config.ledger.rpc_url, "http://node:8545");
    assert_eq!(config.version_file, dir.path().join("VERSION"));
}

#[test]
fn wrong_deployed_version_stops_before_manifest_is_read() {
    let (_dir, args) = workspace("1.6.0");
    let err = run_upgrade_command(&args).expect_err("version gate must fail");
    assert!(err.to_string().starts_with("Upgrade script is not relevant"));
}

#[test]
fn missing_manifest_path_is_a_configuration_error() {
    let (_dir, args) = workspace("1.7.2-stable.0\n");
    let err = run_upgrade_command(&args).expect_err("manifest path is required");
    assert!(err.to_string().contains("pass --manifest or set ABI"));
}

#[test]
fn multisig_run_renders_instructions_and_done() {
    let (dir, args) = workspace("1.7.2-stable.0");
    let config: UpgradeConfig = load_upgrade_config(&args).expect("config must load");
    let artifacts = artifacts();
    let ledger = InMemoryLedger::new();
    ledger.add_proxy(address(1), address(100));
    let verifier = RecordingVerifier::new();

    let lines = execute_run(
        &config,
        manifest(),
        ExecutionMode::MultisigProposal,
        &artifacts,
        &ledger,
        &verifier,
        OutputStyle::Plain,
    )
    .expect("run must succeed");

    assert_eq!(lines.last().map(String::as_str), Some("Done"));
    let header = lines
        .iter()
        .position(|line| line == "Instructions for multisig:")
        .expect("multisig section must be rendered");
    assert!(lines[header + 1].starts_with(&format!("1. Upgrade ContractManager at {}", address(1))));
    assert!(lines[header + 2].starts_with("2. Call ContractManager.initialize() at"));
    assert!(ledger.upgrades().is_empty());
    assert!(dir
        .path()
        .join("data")
        .join("skale-manager-1.8.0-mainnet-abi.json")
        .exists());
}
