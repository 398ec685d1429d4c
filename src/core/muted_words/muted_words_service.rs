// Muted words - per-channel banned words for comments on a creator's content.
//
// Words arrive as one comma-delimited string. Adding appends without
// de-duplicating; removing drops every occurrence of each listed word, which
// is how duplicates get cleaned up. Matching is case-sensitive.

use crate::core::channels::{Authorization, ChannelAuthenticator};
use crate::core::errors::ModerationError;
use async_trait::async_trait;
use std::sync::Arc;

/// Edits are atomic per channel: concurrent appends and removals on the
/// same list never lose each other's words.
#[async_trait]
pub trait MutedWordStore: Send + Sync {
    /// `None` when the channel never saved any words.
    async fn get_words(&self, claim_id: &str) -> Result<Option<Vec<String>>, ModerationError>;

    /// Append `words` and return the whole list.
    async fn append_words(
        &self,
        claim_id: &str,
        words: &[String],
    ) -> Result<Vec<String>, ModerationError>;

    /// Drop every occurrence of each of `words` and return what is left.
    async fn remove_words(
        &self,
        claim_id: &str,
        words: &[String],
    ) -> Result<Vec<String>, ModerationError>;
}

/// Split a comma-delimited word list.
///
/// Empty tokens are dropped so that an empty input (or a stray trailing
/// comma) never turns into a blank muted word.
pub fn split_words(input: &str) -> Vec<String> {
    input
        .split(',')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct MutedWordService<S: MutedWordStore> {
    store: S,
    auth: Arc<ChannelAuthenticator>,
}

impl<S: MutedWordStore> MutedWordService<S> {
    pub fn new(store: S, auth: Arc<ChannelAuthenticator>) -> Self {
        Self { store, auth }
    }

    async fn current(&self, claim_id: &str) -> Result<Vec<String>, ModerationError> {
        Ok(self
            .store
            .get_words(claim_id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|word| !word.is_empty())
            .collect())
    }

    /// `settings.BlockWord`
    pub async fn add(&self, auth: &Authorization, words: &str) -> Result<Vec<String>, ModerationError> {
        let channel = self.auth.authenticate(auth).await?;
        let to_add = split_words(words);
        if to_add.is_empty() {
            return Err(ModerationError::Validation("words is required".to_string()));
        }

        let words = self.store.append_words(&channel.claim_id, &to_add).await?;

        tracing::info!(claim_id = %channel.claim_id, total = words.len(), "Muted words added");
        Ok(words)
    }

    /// `settings.UnBlockWord`
    pub async fn remove(
        &self,
        auth: &Authorization,
        words: &str,
    ) -> Result<Vec<String>, ModerationError> {
        let channel = self.auth.authenticate(auth).await?;
        let to_remove = split_words(words);

        let remaining = self.store.remove_words(&channel.claim_id, &to_remove).await?;

        tracing::info!(claim_id = %channel.claim_id, total = remaining.len(), "Muted words removed");
        Ok(remaining)
    }

    /// `settings.ListBlockedWords`
    pub async fn list(&self, auth: &Authorization) -> Result<Vec<String>, ModerationError> {
        let channel = self.auth.authenticate(auth).await?;
        self.current(&channel.claim_id).await
    }

    /// First muted word of `creator_claim_id` contained in `text`, if any.
    pub async fn find_muted_word(
        &self,
        creator_claim_id: &str,
        text: &str,
    ) -> Result<Option<String>, ModerationError> {
        Ok(self
            .current(creator_claim_id)
            .await?
            .into_iter()
            .find(|word| text.contains(word.as_str())))
    }
}
