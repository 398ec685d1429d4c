// Screening - the checks the comment/reaction pipeline runs before accepting
// content on a creator's claim.
//
// Order matters: the static distrust list is cheapest and most severe, then
// the creator's blocks (own and shared), then muted words.

use crate::core::blocklist::{BlocklistService, BlocklistStore};
use crate::core::errors::ModerationError;
use crate::core::muted_words::{MutedWordService, MutedWordStore};
use crate::core::spam::SpamRegistry;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum ScreenVerdict {
    Allowed,
    DistrustedCommenter,
    DistrustedReactor,
    Blocked,
    MutedWord(String),
}

impl ScreenVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ScreenVerdict::Allowed)
    }
}

pub struct ScreeningService<B: BlocklistStore, M: MutedWordStore> {
    spam: Arc<SpamRegistry>,
    blocklists: Arc<BlocklistService<B>>,
    muted_words: Arc<MutedWordService<M>>,
}

impl<B: BlocklistStore, M: MutedWordStore> ScreeningService<B, M> {
    pub fn new(
        spam: Arc<SpamRegistry>,
        blocklists: Arc<BlocklistService<B>>,
        muted_words: Arc<MutedWordService<M>>,
    ) -> Self {
        Self {
            spam,
            blocklists,
            muted_words,
        }
    }

    pub async fn screen_comment(
        &self,
        commenter_claim_id: &str,
        creator_claim_id: &str,
        text: &str,
    ) -> Result<ScreenVerdict, ModerationError> {
        let verdict = if self.spam.is_distrusted_comment(commenter_claim_id) {
            ScreenVerdict::DistrustedCommenter
        } else if self
            .blocklists
            .is_blocked_for_creator(creator_claim_id, commenter_claim_id)
            .await?
        {
            ScreenVerdict::Blocked
        } else if let Some(word) = self
            .muted_words
            .find_muted_word(creator_claim_id, text)
            .await?
        {
            ScreenVerdict::MutedWord(word)
        } else {
            ScreenVerdict::Allowed
        };

        if !verdict.is_allowed() {
            tracing::debug!(
                commenter = %commenter_claim_id,
                creator = %creator_claim_id,
                ?verdict,
                "Comment screened out"
            );
        }
        Ok(verdict)
    }

    pub fn screen_reaction(&self, reactor_claim_id: &str) -> ScreenVerdict {
        if self.spam.is_distrusted_reaction(reactor_claim_id) {
            ScreenVerdict::DistrustedReactor
        } else {
            ScreenVerdict::Allowed
        }
    }
}
