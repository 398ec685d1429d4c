// Channel identity models.
//
// A channel is keyed by its immutable claim id; the display name can change
// and is refreshed every time the channel signs a request.

use crate::core::errors::ModerationError;
use serde::{Deserialize, Serialize};

/// Claim ids are 20-byte hashes rendered as hex.
pub const CLAIM_ID_LENGTH: usize = 40;

/// A blockchain-identified content owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub claim_id: String,
    pub name: String,
}

impl Channel {
    pub fn new(claim_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            name: name.into(),
        }
    }
}

/// The authorization block embedded in every mutating request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub channel_id: String,
    pub channel_name: String,
    pub signature: String,
    pub signing_ts: String,
}

/// Structural check for a claim id. Says nothing about whether it exists.
pub fn validate_claim_id(field: &str, claim_id: &str) -> Result<(), ModerationError> {
    if claim_id.is_empty() {
        return Err(ModerationError::Validation(format!("{} is required", field)));
    }
    if claim_id.len() != CLAIM_ID_LENGTH || !claim_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ModerationError::Validation(format!(
            "{} must be a {} character hex claim id",
            field, CLAIM_ID_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_channel_name(field: &str, name: &str) -> Result<(), ModerationError> {
    if name.trim().is_empty() {
        return Err(ModerationError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
