// Static distrust lists for comment and reaction spam.
//
// Loaded once at start-up and never mutated. The two sets are independent:
// a channel can be cleared for reactions while still distrusted for comments.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct SpamRegistry {
    comment_spammers: HashSet<String>,
    reaction_spammers: HashSet<String>,
}

impl SpamRegistry {
    pub fn new<C, R>(comment_spammers: C, reaction_spammers: R) -> Self
    where
        C: IntoIterator<Item = String>,
        R: IntoIterator<Item = String>,
    {
        Self {
            comment_spammers: comment_spammers.into_iter().collect(),
            reaction_spammers: reaction_spammers.into_iter().collect(),
        }
    }

    pub fn is_distrusted_comment(&self, claim_id: &str) -> bool {
        self.comment_spammers.contains(claim_id)
    }

    pub fn is_distrusted_reaction(&self, claim_id: &str) -> bool {
        self.reaction_spammers.contains(claim_id)
    }

    /// (comment, reaction) set sizes, for start-up logging.
    pub fn sizes(&self) -> (usize, usize) {
        (self.comment_spammers.len(), self.reaction_spammers.len())
    }
}
