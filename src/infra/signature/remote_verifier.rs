use crate::core::channels::{SignatureError, SignatureVerifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ValidateRequest<'a> {
    channel_id: &'a str,
    signature: &'a str,
    signing_ts: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
}

/// Asks the signature service whether `data` was signed by a channel's key.
pub struct RemoteSignatureVerifier {
    client: Client,
    url: String,
}

impl RemoteSignatureVerifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SignatureVerifier for RemoteSignatureVerifier {
    async fn validate(
        &self,
        claim_id: &str,
        signature: &str,
        signing_ts: &str,
        data: &str,
    ) -> Result<(), SignatureError> {
        let payload = ValidateRequest {
            channel_id: claim_id,
            signature,
            signing_ts,
            data,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SignatureError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SignatureError::Unavailable(format!(
                "verifier returned {} - {}",
                status, text
            )));
        }

        let body: ValidateResponse = response
            .json()
            .await
            .map_err(|e| SignatureError::Unavailable(e.to_string()))?;

        if body.valid {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }
}

/// Accepts every signature. Development only.
pub struct AllowAllVerifier;

#[async_trait]
impl SignatureVerifier for AllowAllVerifier {
    async fn validate(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), SignatureError> {
        Ok(())
    }
}
