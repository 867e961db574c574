use std::time::Duration;

use proxyshift_artifacts::ArtifactSource;
use proxyshift_core::{Address, AliasTable, Manifest, Result, UnitFactory, UpgradeError};
use proxyshift_ledger::{Ledger, Receipt, Submission, TxHash, Verifier};
use proxyshift_resolver::build_factory;
use tracing::{info, warn};

use crate::{UpgradeEvent, UpgradeReport};

const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Upgrades are committed by this process.
    #[default]
    Direct,
    /// Upgrades are emitted as instructions for an external multisig.
    MultisigProposal,
}

impl ExecutionMode {
    pub fn from_multisig_flag(multisig: bool) -> Self {
        if multisig {
            Self::MultisigProposal
        } else {
            Self::Direct
        }
    }

    pub fn is_multisig(self) -> bool {
        self == Self::MultisigProposal
    }
}

/// State shared by every step of one run: the working manifest plus handles to
/// the artifact store, the ledger and the verification service.
pub struct UpgradeContext<'a> {
    pub manifest: Manifest,
    pub aliases: AliasTable,
    pub mode: ExecutionMode,
    pub confirmation_timeout: Duration,
    pub report: UpgradeReport,
    artifacts: &'a dyn ArtifactSource,
    ledger: &'a dyn Ledger,
    verifier: &'a dyn Verifier,
}

impl<'a> UpgradeContext<'a> {
    pub fn new(
        manifest: Manifest,
        mode: ExecutionMode,
        artifacts: &'a dyn ArtifactSource,
        ledger: &'a dyn Ledger,
        verifier: &'a dyn Verifier,
    ) -> Self {
        Self {
            manifest,
            aliases: AliasTable::default(),
            mode,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            report: UpgradeReport::new(),
            artifacts,
            ledger,
            verifier,
        }
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &'a dyn Ledger {
        self.ledger
    }

    pub fn manifest_key(&self, unit: &str) -> String {
        self.aliases.manifest_key(unit).to_string()
    }

    pub fn proxy_address(&self, unit: &str) -> Option<Address> {
        self.manifest.unit_address(self.aliases.manifest_key(unit))
    }

    /// Builds the factory for `unit`, redeploying stale libraries on the way.
    pub fn build_factory(&mut self, unit: &str) -> Result<UnitFactory> {
        let built = build_factory(
            unit,
            self.artifacts,
            &mut self.manifest,
            self.ledger,
            self.confirmation_timeout,
        )?;
        for (library, address) in built.redeployed {
            self.report.push(UpgradeEvent::LibraryRedeployed {
                unit: unit.to_string(),
                library,
                address,
            });
        }
        Ok(built.factory)
    }

    pub fn confirm(&self, unit: &str, tx: &TxHash) -> Result<Receipt> {
        self.ledger
            .wait_for_confirmation(tx, self.confirmation_timeout)
            .map_err(|err| UpgradeError::transaction(unit, err))
    }

    /// Submits `address` for source verification. Failures are reported and
    /// never abort the run.
    pub fn submit_verification(&mut self, unit: &str, address: Address) {
        match self.verifier.verify(unit, address) {
            Ok(Submission::Submitted) => {
                info!(unit, %address, "verification submitted");
                self.report.push(UpgradeEvent::VerificationSubmitted {
                    unit: unit.to_string(),
                    address,
                });
            }
            Ok(Submission::Skipped) => {
                self.report.push(UpgradeEvent::VerificationSkipped {
                    unit: unit.to_string(),
                    address,
                });
            }
            Err(err) => {
                warn!(unit, %address, error = %err, "verification failed");
                self.report.push(UpgradeEvent::VerificationFailed {
                    unit: unit.to_string(),
                    address,
                    reason: err.to_string(),
                });
            }
        }
    }
}
