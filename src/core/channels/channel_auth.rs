// Request authentication.
//
// Every mutating operation starts here: check that the channel named in the
// authorization block actually signed the request, then record it. Nothing
// is allowed to change state before the signature check passes.

use super::channel_models::{validate_channel_name, validate_claim_id, Authorization, Channel};
use crate::core::errors::ModerationError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// PORTS
// ============================================================================

/// Resolves (and lazily creates) channel records.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Upsert: a stored name is replaced by `name`. Only for channels that
    /// proved ownership by signing.
    async fn find_or_create(&self, claim_id: &str, name: &str)
        -> Result<Channel, ModerationError>;

    /// Insert if missing, otherwise return the stored record untouched.
    async fn find_or_insert(&self, claim_id: &str, name: &str)
        -> Result<Channel, ModerationError>;

    async fn find(&self, claim_id: &str) -> Result<Option<Channel>, ModerationError>;
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature does not match channel")]
    Invalid,

    #[error("signature verifier unavailable: {0}")]
    Unavailable(String),
}

/// Validates that `data` was signed by the private key behind `claim_id`.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn validate(
        &self,
        claim_id: &str,
        signature: &str,
        signing_ts: &str,
        data: &str,
    ) -> Result<(), SignatureError>;
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ChannelAuthenticator {
    directory: Arc<dyn ChannelDirectory>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ChannelAuthenticator {
    pub fn new(directory: Arc<dyn ChannelDirectory>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            directory,
            verifier,
        }
    }

    pub fn directory(&self) -> &Arc<dyn ChannelDirectory> {
        &self.directory
    }

    /// Resolve the signing channel, failing before any state change if the
    /// signature does not belong to it.
    pub async fn authenticate(&self, auth: &Authorization) -> Result<Channel, ModerationError> {
        validate_claim_id("channel_id", &auth.channel_id)?;
        validate_channel_name("channel_name", &auth.channel_name)?;
        if auth.signature.is_empty() || auth.signing_ts.is_empty() {
            return Err(ModerationError::Validation(
                "signature and signing_ts are required".to_string(),
            ));
        }

        match self
            .verifier
            .validate(
                &auth.channel_id,
                &auth.signature,
                &auth.signing_ts,
                &auth.channel_name,
            )
            .await
        {
            Ok(()) => {
                self.directory
                    .find_or_create(&auth.channel_id, &auth.channel_name)
                    .await
            }
            Err(SignatureError::Invalid) => {
                tracing::warn!(claim_id = %auth.channel_id, "Rejected request with bad signature");
                Err(ModerationError::Authentication)
            }
            Err(SignatureError::Unavailable(reason)) => {
                tracing::error!(claim_id = %auth.channel_id, "Signature verifier unavailable: {}", reason);
                Err(ModerationError::Upstream(reason))
            }
        }
    }

    /// Resolve a channel referenced by a request (not the signer). The name
    /// is only recorded for a channel seen for the first time; a stored name
    /// belongs to its owner and is returned as is.
    pub async fn resolve_channel(
        &self,
        field: &str,
        claim_id: &str,
        name: &str,
    ) -> Result<Channel, ModerationError> {
        validate_claim_id(field, claim_id)?;
        validate_channel_name(field, name)?;
        self.directory.find_or_insert(claim_id, name).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
