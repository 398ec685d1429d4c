// Delegation domain models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Moderation level stored on a global grant.
pub const GLOBAL_MOD_LEVEL: i64 = 1;

/// A moderator grant: global, or scoped to one creator channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeratorGrant {
    Global {
        moderator_claim_id: String,
    },
    Delegated {
        moderator_claim_id: String,
        creator_claim_id: String,
        creator_name: String,
    },
}

/// How far a moderator's authority reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorityScope {
    /// Only the creators listed in the authorized map (possibly none).
    #[default]
    Channel,
    /// Any creator.
    Global,
}

impl std::fmt::Display for AuthorityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityScope::Channel => write!(f, "Channel"),
            AuthorityScope::Global => write!(f, "Global"),
        }
    }
}

/// Result of resolving a moderator's authority.
///
/// An empty `authorized_creators` map with `Channel` scope means "no
/// authority at all"; callers must not read the scope alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorityResolution {
    /// Creator name -> creator claim id.
    pub authorized_creators: BTreeMap<String, String>,
    pub scope: AuthorityScope,
}

impl AuthorityResolution {
    pub fn has_authority(&self) -> bool {
        self.scope == AuthorityScope::Global || !self.authorized_creators.is_empty()
    }
}
