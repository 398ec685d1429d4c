// Shared blocklist service - list configuration, invites and membership.
//
// Invite state machine (per invite record):
//   pending --accept--> accepted
//   pending --reject--> rejected
//   accepted --reject--> rejected   (member leaves the list)
//   pending --rescind--> (deleted)
//
// Effective membership of a list is computed, never copied: the blocked
// entries of the owner plus those of every member whose invite is currently
// accepted. Accepting therefore merges a member's entries, rejecting removes
// them again, and repeating either has no further effect.
//
// Invite uniqueness (one pending invite per list and invitee) is enforced by
// the store in a single atomic step, so concurrent invites cannot both win.

use super::blocklist_models::{
    BlockedEntry, BlockedListView, BlocklistDefaults, EffectiveListSettings, Invite,
    InviteOutcome, InviteStatus, InviteStatusFilter, ListSettings, NewInvite, ResponseOutcome,
    SharedBlockedList, MAX_INVITE_MESSAGE_LEN,
};
use crate::core::channels::{validate_claim_id, Authorization, Channel, ChannelAuthenticator};
use crate::core::delegation::ModerationAuthority;
use crate::core::errors::ModerationError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait BlocklistStore: Send + Sync {
    /// Create the owner's list or patch the existing one.
    async fn upsert_list(
        &self,
        owner: &Channel,
        patch: &ListSettings,
    ) -> Result<SharedBlockedList, ModerationError>;

    async fn get_list(&self, list_id: u64) -> Result<Option<SharedBlockedList>, ModerationError>;

    async fn list_owned_by(
        &self,
        owner_claim_id: &str,
    ) -> Result<Option<SharedBlockedList>, ModerationError>;

    /// Ids of lists where this channel's latest invite is accepted.
    async fn lists_joined_by(&self, member_claim_id: &str) -> Result<Vec<u64>, ModerationError>;

    /// Atomically store a pending invite.
    ///
    /// A pending invite for the same (list, invitee) created before
    /// `stale_before` is deleted first; a newer one makes this fail with
    /// `Conflict`.
    async fn insert_pending_invite(
        &self,
        invite: &NewInvite,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Invite, ModerationError>;

    /// The most recent invite record for (list, invitee), any status.
    async fn latest_invite(
        &self,
        list_id: u64,
        invitee_claim_id: &str,
    ) -> Result<Option<Invite>, ModerationError>;

    /// Conditionally move the invite for (list, invitee) from one of `from`
    /// to `to`. Only invites created at or after `created_after` qualify when
    /// it is set. Returns the number of rows changed.
    async fn transition_invite(
        &self,
        list_id: u64,
        invitee_claim_id: &str,
        from: &[InviteStatus],
        to: InviteStatus,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<u64, ModerationError>;

    /// Pending invites addressed to this channel, across all lists.
    async fn pending_invites_for(&self, invitee_claim_id: &str)
        -> Result<Vec<Invite>, ModerationError>;

    /// Delete pending invites from `inviter` to `invitee`.
    async fn delete_pending_invites(
        &self,
        inviter_claim_id: &str,
        invitee_claim_id: &str,
    ) -> Result<u64, ModerationError>;

    /// Invite records of a list, oldest first, optionally filtered by status.
    async fn invites(
        &self,
        list_id: u64,
        status: Option<InviteStatus>,
    ) -> Result<Vec<Invite>, ModerationError>;

    /// Idempotent.
    async fn add_block(&self, creator: &Channel, blocked: &Channel) -> Result<(), ModerationError>;

    async fn remove_block(
        &self,
        creator_claim_id: &str,
        blocked_claim_id: &str,
    ) -> Result<u64, ModerationError>;

    /// Entries created by any of `creator_claim_ids`.
    async fn blocked_by(
        &self,
        creator_claim_ids: &[String],
    ) -> Result<Vec<BlockedEntry>, ModerationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct BlocklistService<S: BlocklistStore> {
    store: S,
    auth: Arc<ChannelAuthenticator>,
    moderation: Arc<dyn ModerationAuthority>,
    defaults: BlocklistDefaults,
}

impl<S: BlocklistStore> BlocklistService<S> {
    pub fn new(
        store: S,
        auth: Arc<ChannelAuthenticator>,
        moderation: Arc<dyn ModerationAuthority>,
        defaults: BlocklistDefaults,
    ) -> Self {
        Self {
            store,
            auth,
            moderation,
            defaults,
        }
    }

    /// Fill unset list settings with system defaults.
    pub fn effective_settings(&self, settings: &ListSettings) -> EffectiveListSettings {
        EffectiveListSettings {
            member_invite_enabled: settings.member_invites_allowed(),
            strike_one: settings.strike_one.unwrap_or(self.defaults.strike_one),
            strike_two: settings.strike_two.unwrap_or(self.defaults.strike_two),
            strike_three: settings.strike_three.unwrap_or(self.defaults.strike_three),
            invite_expiration: settings
                .invite_expiration
                .unwrap_or(self.defaults.invite_expiration),
            curse_jar_amount: settings
                .curse_jar_amount
                .unwrap_or(self.defaults.curse_jar_amount),
        }
    }

    /// Invites created before the returned instant have expired. A window
    /// too large to represent never expires.
    fn expiry_cutoff(&self, list: &SharedBlockedList, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.effective_settings(&list.settings).invite_expiration {
            0 => None,
            hours => i64::try_from(hours)
                .ok()
                .and_then(Duration::try_hours)
                .and_then(|window| now.checked_sub_signed(window)),
        }
    }

    async fn require_list(&self, list_id: u64) -> Result<SharedBlockedList, ModerationError> {
        self.store
            .get_list(list_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("blocked list {}", list_id)))
    }

    async fn is_accepted_member(
        &self,
        list_id: u64,
        claim_id: &str,
    ) -> Result<bool, ModerationError> {
        Ok(matches!(
            self.store.latest_invite(list_id, claim_id).await?,
            Some(Invite {
                status: InviteStatus::Accepted,
                ..
            })
        ))
    }

    /// `blockedlist.Update`: create or patch the caller's list.
    pub async fn create_or_update(
        &self,
        auth: &Authorization,
        patch: &ListSettings,
    ) -> Result<SharedBlockedList, ModerationError> {
        patch.validate()?;
        let owner = self.auth.authenticate(auth).await?;

        let mut merged = self
            .store
            .list_owned_by(&owner.claim_id)
            .await?
            .map(|list| list.settings)
            .unwrap_or_default();
        merged.apply(patch);
        let effective = self.effective_settings(&merged);
        if effective.strike_one > effective.strike_two || effective.strike_two > effective.strike_three {
            tracing::warn!(owner = %owner.claim_id, "Strike durations are decreasing");
        }

        let list = self.store.upsert_list(&owner, patch).await?;
        tracing::info!(list_id = list.id, owner = %owner.claim_id, "Shared blocked list saved");
        Ok(list)
    }

    /// `blockedlist.Invite`.
    pub async fn invite(
        &self,
        auth: &Authorization,
        list_id: u64,
        invitee_claim_id: &str,
        invitee_name: &str,
        message: &str,
    ) -> Result<InviteOutcome, ModerationError> {
        if message.chars().count() > MAX_INVITE_MESSAGE_LEN {
            return Err(ModerationError::Validation(format!(
                "message must be at most {} characters",
                MAX_INVITE_MESSAGE_LEN
            )));
        }
        let inviter = self.auth.authenticate(auth).await?;
        let list = self.require_list(list_id).await?;
        let invitee = self
            .auth
            .resolve_channel("invitee_channel_id", invitee_claim_id, invitee_name)
            .await?;

        if invitee.claim_id == list.owner.claim_id || invitee.claim_id == inviter.claim_id {
            return Err(ModerationError::Validation(
                "cannot invite the list owner or yourself".to_string(),
            ));
        }

        let is_owner = inviter.claim_id == list.owner.claim_id;
        if !is_owner {
            let member = list.settings.member_invites_allowed()
                && self.is_accepted_member(list_id, &inviter.claim_id).await?;
            if !member {
                tracing::warn!(list_id, inviter = %inviter.claim_id, "Invite refused");
                return Err(ModerationError::NotAuthorized(
                    "only the list owner or, when enabled, its members may invite".to_string(),
                ));
            }
        }

        if let Some(existing) = self.store.latest_invite(list_id, &invitee.claim_id).await? {
            if existing.status == InviteStatus::Accepted {
                return Ok(InviteOutcome::AlreadyMember(existing));
            }
        }

        let now = Utc::now();
        let new_invite = NewInvite {
            list_id,
            inviter: inviter.clone(),
            invitee: invitee.clone(),
            message: message.to_string(),
            created_at: now,
        };
        let invite = self
            .store
            .insert_pending_invite(&new_invite, self.expiry_cutoff(&list, now))
            .await?;

        tracing::info!(
            list_id,
            inviter = %inviter.claim_id,
            invitee = %invitee.claim_id,
            "Invite created"
        );
        Ok(InviteOutcome::Created(invite))
    }

    /// `blockedlist.Accept` with `accepted = true`.
    pub async fn accept(
        &self,
        auth: &Authorization,
        list_id: u64,
    ) -> Result<ResponseOutcome, ModerationError> {
        let invitee = self.auth.authenticate(auth).await?;
        let list = self.require_list(list_id).await?;

        let changed = self
            .store
            .transition_invite(
                list_id,
                &invitee.claim_id,
                &[InviteStatus::Pending],
                InviteStatus::Accepted,
                self.expiry_cutoff(&list, Utc::now()),
            )
            .await?;
        if changed > 0 {
            tracing::info!(list_id, invitee = %invitee.claim_id, "Invite accepted, entries merged");
            return Ok(ResponseOutcome::Applied);
        }

        match self.store.latest_invite(list_id, &invitee.claim_id).await? {
            Some(invite) => match invite.status {
                InviteStatus::Accepted => Ok(ResponseOutcome::Unchanged),
                InviteStatus::Rejected => Err(ModerationError::Conflict(
                    "invite was rejected; a new invite is required".to_string(),
                )),
                InviteStatus::Pending => Err(ModerationError::Conflict(
                    "invite has expired".to_string(),
                )),
            },
            None => Err(ModerationError::NotFound(format!(
                "no invite to list {} for {}",
                list_id, invitee.name
            ))),
        }
    }

    /// `blockedlist.Accept` with `accepted = false`. Also how a member leaves.
    pub async fn reject(
        &self,
        auth: &Authorization,
        list_id: u64,
    ) -> Result<ResponseOutcome, ModerationError> {
        let invitee = self.auth.authenticate(auth).await?;
        self.require_list(list_id).await?;

        let changed = self
            .store
            .transition_invite(
                list_id,
                &invitee.claim_id,
                &[InviteStatus::Pending, InviteStatus::Accepted],
                InviteStatus::Rejected,
                None,
            )
            .await?;
        if changed > 0 {
            tracing::info!(list_id, invitee = %invitee.claim_id, "Invite rejected, entries removed");
            return Ok(ResponseOutcome::Applied);
        }

        match self.store.latest_invite(list_id, &invitee.claim_id).await? {
            Some(_) => Ok(ResponseOutcome::Unchanged),
            None => Err(ModerationError::NotFound(format!(
                "no invite to list {} for {}",
                list_id, invitee.name
            ))),
        }
    }

    /// `blockedlist.Rescind`: the inviter withdraws a still-pending invite.
    pub async fn rescind(
        &self,
        auth: &Authorization,
        invited_claim_id: &str,
    ) -> Result<u64, ModerationError> {
        validate_claim_id("invited_channel_id", invited_claim_id)?;
        let inviter = self.auth.authenticate(auth).await?;

        let pending = self.store.pending_invites_for(invited_claim_id).await?;
        if pending.is_empty() {
            return Err(ModerationError::NotFound(format!(
                "no pending invite for {}",
                invited_claim_id
            )));
        }
        if !pending.iter().any(|i| i.inviter.claim_id == inviter.claim_id) {
            return Err(ModerationError::Conflict(
                "only the original inviter may rescind an invite".to_string(),
            ));
        }

        let removed = self
            .store
            .delete_pending_invites(&inviter.claim_id, invited_claim_id)
            .await?;
        if removed == 0 {
            // Answered between the lookup and the delete
            return Err(ModerationError::Conflict(
                "invite is no longer pending".to_string(),
            ));
        }

        tracing::info!(inviter = %inviter.claim_id, invitee = %invited_claim_id, "Invite rescinded");
        Ok(removed)
    }

    /// `blockedlist.Get`.
    pub async fn get(
        &self,
        list_id: u64,
        filter: InviteStatusFilter,
    ) -> Result<BlockedListView, ModerationError> {
        let list = self.require_list(list_id).await?;
        let invited_members = match filter {
            InviteStatusFilter::None => Vec::new(),
            other => self.store.invites(list_id, other.status()).await?,
        };
        let effective = self.effective_settings(&list.settings);

        Ok(BlockedListView {
            list,
            effective,
            invited_members,
        })
    }

    /// Block a channel, for the caller or for a creator it moderates.
    pub async fn block(
        &self,
        auth: &Authorization,
        creator_claim_id: Option<&str>,
        blocked_claim_id: &str,
        blocked_name: &str,
    ) -> Result<BlockedEntry, ModerationError> {
        let actor = self.auth.authenticate(auth).await?;
        let creator = self.acting_creator(&actor, creator_claim_id).await?;
        let blocked = self
            .auth
            .resolve_channel("blocked_channel_id", blocked_claim_id, blocked_name)
            .await?;
        if blocked.claim_id == creator.claim_id {
            return Err(ModerationError::Validation(
                "a channel cannot block itself".to_string(),
            ));
        }

        self.store.add_block(&creator, &blocked).await?;
        tracing::info!(
            creator = %creator.claim_id,
            blocked = %blocked.claim_id,
            moderator = %actor.claim_id,
            "Channel blocked"
        );

        Ok(BlockedEntry {
            creator,
            blocked,
            created_at: Utc::now(),
        })
    }

    pub async fn unblock(
        &self,
        auth: &Authorization,
        creator_claim_id: Option<&str>,
        blocked_claim_id: &str,
    ) -> Result<(), ModerationError> {
        validate_claim_id("blocked_channel_id", blocked_claim_id)?;
        let actor = self.auth.authenticate(auth).await?;
        let creator = self.acting_creator(&actor, creator_claim_id).await?;

        if self
            .store
            .remove_block(&creator.claim_id, blocked_claim_id)
            .await?
            == 0
        {
            return Err(ModerationError::NotFound(format!(
                "{} has not blocked {}",
                creator.name, blocked_claim_id
            )));
        }
        tracing::info!(creator = %creator.claim_id, blocked = %blocked_claim_id, "Channel unblocked");
        Ok(())
    }

    /// The creator a moderation action applies to.
    async fn acting_creator(
        &self,
        actor: &Channel,
        creator_claim_id: Option<&str>,
    ) -> Result<Channel, ModerationError> {
        let creator_claim_id = match creator_claim_id {
            Some(id) if id != actor.claim_id => id,
            _ => return Ok(actor.clone()),
        };
        validate_claim_id("creator_channel_id", creator_claim_id)?;

        if !self.moderation.may_moderate(actor, creator_claim_id).await? {
            tracing::warn!(moderator = %actor.claim_id, creator = %creator_claim_id, "Moderation refused");
            return Err(ModerationError::NotAuthorized(
                "not a moderator for this creator".to_string(),
            ));
        }
        self.auth
            .directory()
            .find(creator_claim_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("channel {}", creator_claim_id)))
    }

    /// Claim ids currently blocked through a shared list.
    pub async fn effective_blocked(&self, list_id: u64) -> Result<BTreeSet<String>, ModerationError> {
        let list = self.require_list(list_id).await?;
        let contributors = self.contributors(&list).await?;
        self.blocked_set(&contributors).await
    }

    /// Is `candidate` blocked on `creator`'s content, either directly or
    /// through a list the creator owns or has joined?
    pub async fn is_blocked_for_creator(
        &self,
        creator_claim_id: &str,
        candidate_claim_id: &str,
    ) -> Result<bool, ModerationError> {
        let mut contributors: BTreeSet<String> = BTreeSet::new();
        contributors.insert(creator_claim_id.to_string());

        let mut lists = Vec::new();
        if let Some(owned) = self.store.list_owned_by(creator_claim_id).await? {
            lists.push(owned);
        }
        for list_id in self.store.lists_joined_by(creator_claim_id).await? {
            if let Some(list) = self.store.get_list(list_id).await? {
                lists.push(list);
            }
        }
        for list in &lists {
            contributors.extend(self.contributors(list).await?);
        }

        let contributors: Vec<String> = contributors.into_iter().collect();
        Ok(self.blocked_set(&contributors).await?.contains(candidate_claim_id))
    }

    /// Owner plus currently accepted members.
    async fn contributors(&self, list: &SharedBlockedList) -> Result<Vec<String>, ModerationError> {
        let mut ids = vec![list.owner.claim_id.clone()];
        ids.extend(
            self.store
                .invites(list.id, Some(InviteStatus::Accepted))
                .await?
                .into_iter()
                .map(|invite| invite.invitee.claim_id),
        );
        Ok(ids)
    }

    async fn blocked_set(&self, creators: &[String]) -> Result<BTreeSet<String>, ModerationError> {
        Ok(self
            .store
            .blocked_by(creators)
            .await?
            .into_iter()
            .map(|entry| entry.blocked.claim_id)
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
