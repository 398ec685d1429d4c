// Delegation resolver - answers "who am I allowed to moderate as".
//
// Resolution is two explicit steps:
// 1. collect every creator this channel holds a delegated grant for
//    (scope = Channel, even if the map ends up empty)
// 2. if a global grant exists, override scope = Global and keep the map
//    as supplementary information
//
// Reads go straight to the store on every call; there is no process-wide
// cache to invalidate when grants change.

use super::delegation_models::{AuthorityResolution, AuthorityScope, ModeratorGrant};
use crate::core::channels::{Authorization, Channel, ChannelAuthenticator};
use crate::core::errors::ModerationError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait DelegationStore: Send + Sync {
    /// Delegated grants held by this moderator, with the creator's current
    /// name. Duplicate grants may come back as duplicate rows.
    async fn delegated_grants(
        &self,
        moderator_claim_id: &str,
    ) -> Result<Vec<ModeratorGrant>, ModerationError>;

    /// The (at most one) global grant held by this moderator.
    async fn global_grant(
        &self,
        moderator_claim_id: &str,
    ) -> Result<Option<ModeratorGrant>, ModerationError>;

    async fn add_delegate(
        &self,
        moderator: &Channel,
        creator: &Channel,
    ) -> Result<(), ModerationError>;

    /// Returns the number of grants removed.
    async fn remove_delegate(
        &self,
        moderator_claim_id: &str,
        creator_claim_id: &str,
    ) -> Result<u64, ModerationError>;

    /// Moderator channels delegated by this creator.
    async fn delegates_of(&self, creator_claim_id: &str) -> Result<Vec<Channel>, ModerationError>;

    /// Idempotent: a channel holds at most one global grant.
    async fn grant_global(&self, moderator_claim_id: &str) -> Result<(), ModerationError>;
}

/// Narrow authority check other services depend on.
#[async_trait]
pub trait ModerationAuthority: Send + Sync {
    async fn may_moderate(
        &self,
        moderator: &Channel,
        creator_claim_id: &str,
    ) -> Result<bool, ModerationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct DelegationResolver<S: DelegationStore> {
    store: S,
    auth: Arc<ChannelAuthenticator>,
}

impl<S: DelegationStore> DelegationResolver<S> {
    pub fn new(store: S, auth: Arc<ChannelAuthenticator>) -> Self {
        Self { store, auth }
    }

    /// Compute the authority held by an already-authenticated channel.
    pub async fn resolve_authority(
        &self,
        channel: &Channel,
    ) -> Result<AuthorityResolution, ModerationError> {
        let mut resolution = AuthorityResolution::default();

        let grants = self.store.delegated_grants(&channel.claim_id).await?;
        let authorized: BTreeMap<String, String> = grants
            .into_iter()
            .filter_map(|grant| match grant {
                ModeratorGrant::Delegated {
                    creator_claim_id,
                    creator_name,
                    ..
                } => Some((creator_name, creator_claim_id)),
                ModeratorGrant::Global { .. } => None,
            })
            .collect();
        // Step 1 leaves scope at its Channel default.
        resolution.authorized_creators = authorized;

        if self.store.global_grant(&channel.claim_id).await?.is_some() {
            resolution.scope = AuthorityScope::Global;
        }

        tracing::debug!(
            claim_id = %channel.claim_id,
            scope = %resolution.scope,
            creators = resolution.authorized_creators.len(),
            any_authority = resolution.has_authority(),
            "Resolved moderator authority"
        );
        Ok(resolution)
    }

    /// `moderation.AmI`: authenticate, then resolve.
    pub async fn am_i(
        &self,
        auth: &Authorization,
    ) -> Result<(Channel, AuthorityResolution), ModerationError> {
        let channel = self.auth.authenticate(auth).await?;
        let resolution = self.resolve_authority(&channel).await?;
        Ok((channel, resolution))
    }

    /// A creator grants `moderator` authority over its content.
    pub async fn add_delegate(
        &self,
        auth: &Authorization,
        moderator_claim_id: &str,
        moderator_name: &str,
    ) -> Result<Vec<Channel>, ModerationError> {
        let creator = self.auth.authenticate(auth).await?;
        let moderator = self
            .auth
            .resolve_channel("mod_channel_id", moderator_claim_id, moderator_name)
            .await?;
        if moderator.claim_id == creator.claim_id {
            return Err(ModerationError::Validation(
                "a channel cannot delegate moderation to itself".to_string(),
            ));
        }

        let existing = self.store.delegates_of(&creator.claim_id).await?;
        if !existing.iter().any(|c| c.claim_id == moderator.claim_id) {
            self.store.add_delegate(&moderator, &creator).await?;
            tracing::info!(
                creator = %creator.claim_id,
                moderator = %moderator.claim_id,
                "Delegated moderator added"
            );
        }

        self.store.delegates_of(&creator.claim_id).await
    }

    pub async fn remove_delegate(
        &self,
        auth: &Authorization,
        moderator_claim_id: &str,
    ) -> Result<Vec<Channel>, ModerationError> {
        let creator = self.auth.authenticate(auth).await?;
        crate::core::channels::validate_claim_id("mod_channel_id", moderator_claim_id)?;

        let removed = self
            .store
            .remove_delegate(moderator_claim_id, &creator.claim_id)
            .await?;
        if removed == 0 {
            return Err(ModerationError::NotFound(format!(
                "channel {} is not a delegate of {}",
                moderator_claim_id, creator.name
            )));
        }
        tracing::info!(
            creator = %creator.claim_id,
            moderator = %moderator_claim_id,
            "Delegated moderator removed"
        );

        self.store.delegates_of(&creator.claim_id).await
    }

    pub async fn list_delegates(&self, auth: &Authorization) -> Result<Vec<Channel>, ModerationError> {
        let creator = self.auth.authenticate(auth).await?;
        self.store.delegates_of(&creator.claim_id).await
    }

    /// Install global grants listed in configuration.
    pub async fn seed_global_moderators(&self, claim_ids: &[String]) -> Result<(), ModerationError> {
        for claim_id in claim_ids {
            crate::core::channels::validate_claim_id("GLOBAL_MODERATORS", claim_id)?;
            self.store.grant_global(claim_id).await?;
        }
        if !claim_ids.is_empty() {
            tracing::info!(count = claim_ids.len(), "Seeded global moderators");
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DelegationStore> ModerationAuthority for DelegationResolver<S> {
    async fn may_moderate(
        &self,
        moderator: &Channel,
        creator_claim_id: &str,
    ) -> Result<bool, ModerationError> {
        if moderator.claim_id == creator_claim_id {
            return Ok(true);
        }
        if self.store.global_grant(&moderator.claim_id).await?.is_some() {
            return Ok(true);
        }
        // Match on claim ids; creator names are not unique.
        let grants = self.store.delegated_grants(&moderator.claim_id).await?;
        Ok(grants.iter().any(|grant| {
            matches!(
                grant,
                ModeratorGrant::Delegated { creator_claim_id: id, .. } if id == creator_claim_id
            )
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::channel_auth::tests::{authenticator, sign};
    use dashmap::DashSet;
    use std::sync::Mutex;

    /// In-memory store for testing
    #[derive(Default)]
    struct MockDelegationStore {
        // (moderator, creator claim id, creator name), duplicates allowed
        delegated: Mutex<Vec<(Channel, Channel)>>,
        globals: DashSet<String>,
        fail_reads: DashSet<String>,
    }

    #[async_trait]
    impl DelegationStore for MockDelegationStore {
        async fn delegated_grants(
            &self,
            moderator_claim_id: &str,
        ) -> Result<Vec<ModeratorGrant>, ModerationError> {
            if self.fail_reads.contains(moderator_claim_id) {
                return Err(ModerationError::StorageError("disk I/O error".to_string()));
            }
            Ok(self
                .delegated
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m.claim_id == moderator_claim_id)
                .map(|(m, c)| ModeratorGrant::Delegated {
                    moderator_claim_id: m.claim_id.clone(),
                    creator_claim_id: c.claim_id.clone(),
                    creator_name: c.name.clone(),
                })
                .collect())
        }

        async fn global_grant(
            &self,
            moderator_claim_id: &str,
        ) -> Result<Option<ModeratorGrant>, ModerationError> {
            Ok(self
                .globals
                .contains(moderator_claim_id)
                .then(|| ModeratorGrant::Global {
                    moderator_claim_id: moderator_claim_id.to_string(),
                }))
        }

        async fn add_delegate(
            &self,
            moderator: &Channel,
            creator: &Channel,
        ) -> Result<(), ModerationError> {
            self.delegated
                .lock()
                .unwrap()
                .push((moderator.clone(), creator.clone()));
            Ok(())
        }

        async fn remove_delegate(
            &self,
            moderator_claim_id: &str,
            creator_claim_id: &str,
        ) -> Result<u64, ModerationError> {
            let mut rows = self.delegated.lock().unwrap();
            let before = rows.len();
            rows.retain(|(m, c)| {
                !(m.claim_id == moderator_claim_id && c.claim_id == creator_claim_id)
            });
            Ok((before - rows.len()) as u64)
        }

        async fn delegates_of(
            &self,
            creator_claim_id: &str,
        ) -> Result<Vec<Channel>, ModerationError> {
            Ok(self
                .delegated
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, c)| c.claim_id == creator_claim_id)
                .map(|(m, _)| m.clone())
                .collect())
        }

        async fn grant_global(&self, moderator_claim_id: &str) -> Result<(), ModerationError> {
            self.globals.insert(moderator_claim_id.to_string());
            Ok(())
        }
    }

    const MOD: &str = "1111111111111111111111111111111111111111";
    const CREATOR_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const CREATOR_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn resolver() -> DelegationResolver<MockDelegationStore> {
        DelegationResolver::new(MockDelegationStore::default(), Arc::new(authenticator()))
    }

    fn moderator() -> Channel {
        Channel::new(MOD, "@mod")
    }

    #[tokio::test]
    async fn test_no_grants_yields_empty_channel_scope() {
        let service = resolver();
        let resolution = service.resolve_authority(&moderator()).await.unwrap();

        assert_eq!(resolution.scope, AuthorityScope::Channel);
        assert!(resolution.authorized_creators.is_empty());
        assert!(!resolution.has_authority());
    }

    #[tokio::test]
    async fn test_delegated_grants_are_collected() {
        let service = resolver();
        service
            .add_delegate(&sign(CREATOR_A, "@a"), MOD, "@mod")
            .await
            .unwrap();
        service
            .add_delegate(&sign(CREATOR_B, "@b"), MOD, "@mod")
            .await
            .unwrap();

        let resolution = service.resolve_authority(&moderator()).await.unwrap();
        assert_eq!(resolution.scope, AuthorityScope::Channel);
        assert_eq!(resolution.authorized_creators.len(), 2);
        assert_eq!(resolution.authorized_creators["@a"], CREATOR_A);
        assert_eq!(resolution.authorized_creators["@b"], CREATOR_B);
    }

    #[tokio::test]
    async fn test_global_grant_overrides_scope_but_keeps_delegations() {
        let service = resolver();
        service
            .add_delegate(&sign(CREATOR_A, "@a"), MOD, "@mod")
            .await
            .unwrap();
        service
            .seed_global_moderators(&[MOD.to_string()])
            .await
            .unwrap();

        let resolution = service.resolve_authority(&moderator()).await.unwrap();
        assert_eq!(resolution.scope, AuthorityScope::Global);
        assert_eq!(resolution.authorized_creators.len(), 1);
        assert!(service.may_moderate(&moderator(), CREATOR_B).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_grants_collapse_in_the_map() {
        let service = resolver();
        let creator = Channel::new(CREATOR_A, "@a");
        service.store.add_delegate(&moderator(), &creator).await.unwrap();
        service.store.add_delegate(&moderator(), &creator).await.unwrap();

        let resolution = service.resolve_authority(&moderator()).await.unwrap();
        assert_eq!(resolution.authorized_creators.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_resolution() {
        let service = resolver();
        service.store.fail_reads.insert(MOD.to_string());

        let err = service.resolve_authority(&moderator()).await.unwrap_err();
        assert!(matches!(err, ModerationError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_am_i_requires_a_valid_signature() {
        let service = resolver();
        let mut forged = sign(MOD, "@mod");
        forged.signature = "garbage".to_string();

        let err = service.am_i(&forged).await.unwrap_err();
        assert_eq!(err, ModerationError::Authentication);
    }

    #[tokio::test]
    async fn test_add_delegate_is_idempotent_and_listable() {
        let service = resolver();
        let creator = sign(CREATOR_A, "@a");
        service.add_delegate(&creator, MOD, "@mod").await.unwrap();
        let delegates = service.add_delegate(&creator, MOD, "@mod").await.unwrap();

        assert_eq!(delegates, vec![moderator()]);
        assert_eq!(service.list_delegates(&creator).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_delegation_is_rejected() {
        let service = resolver();
        let err = service
            .add_delegate(&sign(CREATOR_A, "@a"), CREATOR_A, "@a")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_remove_unknown_delegate_is_not_found() {
        let service = resolver();
        let err = service
            .remove_delegate(&sign(CREATOR_A, "@a"), MOD)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_may_moderate() {
        let service = resolver();
        service
            .add_delegate(&sign(CREATOR_A, "@a"), MOD, "@mod")
            .await
            .unwrap();

        assert!(service.may_moderate(&moderator(), CREATOR_A).await.unwrap());
        assert!(!service.may_moderate(&moderator(), CREATOR_B).await.unwrap());
        // A creator always moderates its own content
        let creator_b = Channel::new(CREATOR_B, "@b");
        assert!(service.may_moderate(&creator_b, CREATOR_B).await.unwrap());
    }

    #[tokio::test]
    async fn test_may_moderate_creators_sharing_a_name() {
        let service = resolver();
        service
            .add_delegate(&sign(CREATOR_A, "@same"), MOD, "@mod")
            .await
            .unwrap();
        service
            .add_delegate(&sign(CREATOR_B, "@same"), MOD, "@mod")
            .await
            .unwrap();

        // The name-keyed map can only hold one of them...
        let resolution = service.resolve_authority(&moderator()).await.unwrap();
        assert_eq!(resolution.authorized_creators.len(), 1);

        // ...but authority covers both
        assert!(service.may_moderate(&moderator(), CREATOR_A).await.unwrap());
        assert!(service.may_moderate(&moderator(), CREATOR_B).await.unwrap());
    }
}
