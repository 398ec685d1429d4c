// `blockedlist.*` methods: shared list configuration and the invite flow.

use crate::core::blocklist::{
    BlocklistService, BlocklistStore, EffectiveListSettings, Invite, InviteOutcome,
    InviteStatusFilter, ListSettings, ResponseOutcome, SharedBlockedList,
};
use crate::core::channels::Authorization;
use crate::core::errors::ModerationError;
use crate::rpc::protocol::{parse_params, to_result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ARGUMENTS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(flatten)]
    pub settings: ListSettings,
}

#[derive(Debug, Deserialize)]
pub struct InviteArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    pub blocked_list_id: u64,
    #[serde(default)]
    pub invitee_channel_id: String,
    #[serde(default)]
    pub invitee_channel_name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    pub blocked_list_id: u64,
    pub accepted: bool,
}

/// Clients also send `invited_channel_name`; the claim id alone identifies
/// the invite, so the name is accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct RescindArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(default)]
    pub invited_channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GetArgs {
    pub blocked_list_id: u64,
    #[serde(default)]
    pub status: InviteStatusFilter,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SharedBlockedListView {
    pub id: u64,
    pub owner_channel_id: String,
    pub owner_channel_name: String,
    #[serde(flatten)]
    pub settings: ListSettings,
}

impl From<SharedBlockedList> for SharedBlockedListView {
    fn from(list: SharedBlockedList) -> Self {
        Self {
            id: list.id,
            owner_channel_id: list.owner.claim_id,
            owner_channel_name: list.owner.name,
            settings: list.settings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvitedMember {
    pub invited_by_channel_id: String,
    pub invited_by_channel_name: String,
    pub invitee_channel_id: String,
    pub invitee_channel_name: String,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<Invite> for InvitedMember {
    fn from(invite: Invite) -> Self {
        Self {
            invited_by_channel_id: invite.inviter.claim_id,
            invited_by_channel_name: invite.inviter.name,
            invitee_channel_id: invite.invitee.claim_id,
            invitee_channel_name: invite.invitee.name,
            status: invite.status.to_string(),
            message: invite.message,
            created_at: invite.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub invite: InvitedMember,
    /// True when the invitee had already accepted; nothing was created.
    pub already_member: bool,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    /// False when the invite was already in the requested state.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RescindResponse {
    pub rescinded: u64,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub shared_blocked_list: SharedBlockedListView,
    pub effective_settings: EffectiveListSettings,
    pub invited_members: Vec<InvitedMember>,
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn update<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: UpdateArgs = parse_params(params)?;
    let list = blocklists.create_or_update(&args.auth, &args.settings).await?;
    to_result(SharedBlockedListView::from(list))
}

pub async fn invite<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: InviteArgs = parse_params(params)?;
    let outcome = blocklists
        .invite(
            &args.auth,
            args.blocked_list_id,
            &args.invitee_channel_id,
            &args.invitee_channel_name,
            &args.message,
        )
        .await?;

    let (invite, already_member) = match outcome {
        InviteOutcome::Created(invite) => (invite, false),
        InviteOutcome::AlreadyMember(invite) => (invite, true),
    };
    to_result(InviteResponse {
        invite: invite.into(),
        already_member,
    })
}

pub async fn accept<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: AcceptArgs = parse_params(params)?;
    let outcome = if args.accepted {
        blocklists.accept(&args.auth, args.blocked_list_id).await?
    } else {
        blocklists.reject(&args.auth, args.blocked_list_id).await?
    };
    to_result(AcceptResponse {
        changed: outcome == ResponseOutcome::Applied,
    })
}

pub async fn rescind<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: RescindArgs = parse_params(params)?;
    let rescinded = blocklists
        .rescind(&args.auth, &args.invited_channel_id)
        .await?;
    to_result(RescindResponse { rescinded })
}

pub async fn get<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: GetArgs = parse_params(params)?;
    let view = blocklists.get(args.blocked_list_id, args.status).await?;
    to_result(GetResponse {
        shared_blocked_list: view.list.into(),
        effective_settings: view.effective,
        invited_members: view.invited_members.into_iter().map(Into::into).collect(),
    })
}
