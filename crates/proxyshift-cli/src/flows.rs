use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use proxyshift_artifacts::{ArtifactDirectory, ArtifactSource};
use proxyshift_core::{Manifest, UpgradeConfig, UpgradeError};
use proxyshift_ledger::{HttpVerifier, Ledger, RpcLedger, SkipVerification, Verifier};
use proxyshift_upgrade::{ensure_deployed_version, run_upgrade, ExecutionMode, UpgradeContext};
use tracing::{debug, info};

use crate::render::{current_output_style, format_report_lines, OutputStyle, TerminalProgress};
use crate::UpgradeArgs;

pub(crate) fn run_upgrade_command(args: &UpgradeArgs) -> Result<()> {
    let config = load_upgrade_config(args)?;
    ensure_deployed_version(
        &config.deployed_version_file,
        &config.expected_deployed_version,
    )?;

    let manifest_path = args.manifest.as_deref().ok_or_else(|| {
        UpgradeError::Configuration(
            "input manifest is required: pass --manifest or set ABI".to_string(),
        )
    })?;
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    let artifacts = ArtifactDirectory::open(&config.artifacts_dir).with_context(|| {
        format!(
            "failed to index artifacts in {}",
            config.artifacts_dir.display()
        )
    })?;
    debug!(artifacts = artifacts.len(), root = %artifacts.root().display(), "artifacts indexed");

    let ledger = RpcLedger::new(config.ledger.rpc_url.clone())
        .with_context(|| format!("failed to connect to {}", config.ledger.rpc_url))?
        .with_poll_interval(Duration::from_millis(config.ledger.poll_interval_ms));
    debug!(rpc_url = ledger.url(), "ledger client ready");
    let verifier = build_verifier(&config)?;
    let mode = ExecutionMode::from_multisig_flag(args.multisig);

    let style = current_output_style();
    let lines = execute_run(&config, manifest, mode, &artifacts, &ledger, verifier.as_ref(), style)?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn load_upgrade_config(args: &UpgradeArgs) -> Result<UpgradeConfig> {
    let raw = fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;
    let base = args.config.parent().unwrap_or(Path::new("."));
    let mut config = UpgradeConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config {}", args.config.display()))?
        .with_base_dir(base);

    if let Some(network) = &args.network {
        config.network = network.clone();
    }
    if let Some(rpc_url) = &args.rpc_url {
        config.ledger.rpc_url = rpc_url.clone();
    }
    Ok(config)
}

fn build_verifier(config: &UpgradeConfig) -> Result<Box<dyn Verifier>> {
    match &config.verification {
        Some(settings) => {
            let verifier = HttpVerifier::new(settings.endpoint.clone(), config.network.clone())
                .with_context(|| format!("failed to set up verifier {}", settings.endpoint))?;
            Ok(Box::new(verifier))
        }
        None => Ok(Box::new(SkipVerification)),
    }
}

/// Runs the migration against the given collaborators and returns the lines to
/// print.
pub(crate) fn execute_run(
    config: &UpgradeConfig,
    manifest: Manifest,
    mode: ExecutionMode,
    artifacts: &dyn ArtifactSource,
    ledger: &dyn Ledger,
    verifier: &dyn Verifier,
    style: OutputStyle,
) -> Result<Vec<String>> {
    info!(
        product = %config.product,
        network = %config.network,
        multisig = mode.is_multisig(),
        "starting upgrade"
    );
    let mut ctx = UpgradeContext::new(manifest, mode, artifacts, ledger, verifier)
        .with_aliases(config.aliases.clone())
        .with_confirmation_timeout(config.confirmation_timeout());
    let mut progress = TerminalProgress::new(style);

    run_upgrade(&mut ctx, config, &mut progress)?;
    Ok(format_report_lines(&ctx.report, style))
}
