use std::fmt;
use std::path::PathBuf;

use proxyshift_core::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Executing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
        }
    }
}

/// Observer for per-unit progress; the CLI drives a progress bar from it.
pub trait Progress {
    fn unit_started(&mut self, _phase: Phase, _index: usize, _total: usize, _unit: &str) {}

    fn phase_finished(&mut self, _phase: Phase) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeEvent {
    LibraryRedeployed {
        unit: String,
        library: String,
        address: Address,
    },
    UnitSkipped {
        unit: String,
    },
    UpToDate {
        unit: String,
    },
    UpgradePending {
        unit: String,
        proxy: Address,
        current: Address,
        target: Address,
    },
    VerificationSubmitted {
        unit: String,
        address: Address,
    },
    VerificationSkipped {
        unit: String,
        address: Address,
    },
    VerificationFailed {
        unit: String,
        address: Address,
        reason: String,
    },
    Upgraded {
        unit: String,
        proxy: Address,
        implementation: Address,
        gas_used: u64,
    },
    MultisigUpgrade {
        unit: String,
        proxy: Address,
        implementation: Address,
    },
    Deployed {
        unit: String,
        proxy: Address,
        gas_used: u64,
    },
    Registered {
        unit: String,
        registry: String,
        address: Address,
    },
    Initialized {
        unit: String,
        entry_point: String,
        address: Address,
        gas_used: u64,
    },
    MultisigCall {
        unit: String,
        entry_point: String,
        address: Address,
    },
    ManifestWritten {
        path: PathBuf,
    },
}

impl UpgradeEvent {
    /// Actions an operator has to submit to the multisig by hand.
    pub fn is_multisig_instruction(&self) -> bool {
        matches!(self, Self::MultisigUpgrade { .. } | Self::MultisigCall { .. })
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. } | Self::UnitSkipped { .. })
    }
}

impl fmt::Display for UpgradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LibraryRedeployed {
                unit,
                library,
                address,
            } => write!(f, "Library {library} for {unit} redeployed at {address}"),
            Self::UnitSkipped { unit } => {
                write!(f, "{unit} is not in the manifest, skipped")
            }
            Self::UpToDate { unit } => write!(f, "Contract {unit} is up to date"),
            Self::UpgradePending {
                unit,
                current,
                target,
                ..
            } => write!(f, "Contract {unit} will be upgraded from {current} to {target}"),
            Self::VerificationSubmitted { unit, address } => {
                write!(f, "Submitted {unit} at {address} for verification")
            }
            Self::VerificationSkipped { unit, address } => {
                write!(f, "Verification of {unit} at {address} skipped")
            }
            Self::VerificationFailed {
                unit,
                address,
                reason,
            } => write!(f, "Verification of {unit} at {address} failed: {reason}"),
            Self::Upgraded {
                unit,
                proxy,
                gas_used,
                ..
            } => write!(f, "Upgrade {unit} at {proxy} ({gas_used} gas used)"),
            Self::MultisigUpgrade {
                unit,
                proxy,
                implementation,
            } => write!(f, "Upgrade {unit} at {proxy} to {implementation}"),
            Self::Deployed {
                unit,
                proxy,
                gas_used,
            } => write!(f, "Deployed {unit} at {proxy} ({gas_used} gas used)"),
            Self::Registered {
                unit,
                registry,
                address,
            } => write!(f, "Registered {unit} at {address} in {registry}"),
            Self::Initialized {
                unit,
                entry_point,
                gas_used,
                ..
            } => write!(f, "{unit}.{entry_point}() done with {gas_used} gas used"),
            Self::MultisigCall {
                unit,
                entry_point,
                address,
            } => write!(f, "Call {unit}.{entry_point}() at {address}"),
            Self::ManifestWritten { path } => write!(f, "Wrote {}", path.display()),
        }
    }
}

/// Ordered record of everything a run did or asks an operator to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    events: Vec<UpgradeEvent>,
}

impl UpgradeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: UpgradeEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[UpgradeEvent] {
        &self.events
    }

    pub fn multisig_instructions(&self) -> Vec<&UpgradeEvent> {
        self.events
            .iter()
            .filter(|event| event.is_multisig_instruction())
            .collect()
    }

    pub fn upgraded_units(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                UpgradeEvent::Upgraded { unit, .. } => Some(unit.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
