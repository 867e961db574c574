use proxyshift_core::{Address, VerificationError};
use reqwest::blocking::Client;
use serde_json::json;
use tracing::debug;

use crate::{Submission, Verifier};

/// Submits `{contract, address, network}` to a source-verification endpoint.
#[derive(Debug)]
pub struct HttpVerifier {
    endpoint: String,
    network: String,
    client: Client,
}

impl HttpVerifier {
    pub fn new(
        endpoint: impl Into<String>,
        network: impl Into<String>,
    ) -> Result<Self, VerificationError> {
        let client = Client::builder().build().map_err(|err| {
            VerificationError::Transport(format!("failed to build http client: {err}"))
        })?;
        Ok(Self {
            endpoint: endpoint.into(),
            network: network.into(),
            client,
        })
    }
}

impl Verifier for HttpVerifier {
    fn verify(&self, unit: &str, address: Address) -> Result<Submission, VerificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "contract": unit,
                "address": address.to_string(),
                "network": self.network,
            }))
            .send()
            .map_err(|err| VerificationError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VerificationError::Rejected {
                unit: unit.to_string(),
                address: address.to_string(),
                reason: format!("http status {status}: {}", body.trim()),
            });
        }

        debug!(unit, %address, endpoint = %self.endpoint, "verification accepted");
        Ok(Submission::Submitted)
    }
}

/// Used when no verification endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipVerification;

impl Verifier for SkipVerification {
    fn verify(&self, unit: &str, address: Address) -> Result<Submission, VerificationError> {
        debug!(unit, %address, "verification skipped: no endpoint configured");
        Ok(Submission::Skipped)
    }
}
