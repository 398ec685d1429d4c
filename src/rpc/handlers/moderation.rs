// `moderation.*` methods: authority lookup, delegates, channel blocks.

use crate::core::blocklist::{BlocklistService, BlocklistStore};
use crate::core::channels::{Authorization, Channel};
use crate::core::delegation::{DelegationResolver, DelegationStore};
use crate::core::errors::ModerationError;
use crate::rpc::protocol::{parse_params, to_result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct AmIArgs {
    #[serde(flatten)]
    pub auth: Authorization,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AmIResponse {
    pub channel_name: String,
    pub channel_id: String,
    /// "Channel" or "Global".
    #[serde(rename = "type")]
    pub scope: String,
    /// Creator name -> creator claim id.
    pub authorized_channels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct DelegateArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(default)]
    pub mod_channel_id: String,
    #[serde(default)]
    pub mod_channel_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ChannelView {
    pub channel_id: String,
    pub channel_name: String,
}

impl From<Channel> for ChannelView {
    fn from(channel: Channel) -> Self {
        Self {
            channel_id: channel.claim_id,
            channel_name: channel.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DelegatesResponse {
    pub delegates: Vec<ChannelView>,
}

#[derive(Debug, Deserialize)]
pub struct BlockArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(default)]
    pub blocked_channel_id: String,
    #[serde(default)]
    pub blocked_channel_name: String,
    /// Set when a moderator blocks on a creator's behalf.
    #[serde(default)]
    pub creator_channel_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub creator_channel_id: String,
    pub blocked_channel_id: String,
    pub blocked_channel_name: String,
}

#[derive(Debug, Serialize)]
pub struct UnBlockResponse {
    pub creator_channel_id: String,
    pub blocked_channel_id: String,
}

pub async fn am_i<D: DelegationStore>(
    resolver: &DelegationResolver<D>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: AmIArgs = parse_params(params)?;
    let (channel, resolution) = resolver.am_i(&args.auth).await?;
    to_result(AmIResponse {
        channel_name: channel.name,
        channel_id: channel.claim_id,
        scope: resolution.scope.to_string(),
        authorized_channels: resolution.authorized_creators,
    })
}

pub async fn add_delegate<D: DelegationStore>(
    resolver: &DelegationResolver<D>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: DelegateArgs = parse_params(params)?;
    let delegates = resolver
        .add_delegate(&args.auth, &args.mod_channel_id, &args.mod_channel_name)
        .await?;
    delegates_response(delegates)
}

pub async fn remove_delegate<D: DelegationStore>(
    resolver: &DelegationResolver<D>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: DelegateArgs = parse_params(params)?;
    let delegates = resolver
        .remove_delegate(&args.auth, &args.mod_channel_id)
        .await?;
    delegates_response(delegates)
}

pub async fn list_delegates<D: DelegationStore>(
    resolver: &DelegationResolver<D>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: AmIArgs = parse_params(params)?;
    delegates_response(resolver.list_delegates(&args.auth).await?)
}

fn delegates_response(delegates: Vec<Channel>) -> Result<Value, ModerationError> {
    to_result(DelegatesResponse {
        delegates: delegates.into_iter().map(ChannelView::from).collect(),
    })
}

pub async fn block<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: BlockArgs = parse_params(params)?;
    let entry = blocklists
        .block(
            &args.auth,
            args.creator_channel_id.as_deref(),
            &args.blocked_channel_id,
            &args.blocked_channel_name,
        )
        .await?;
    to_result(BlockResponse {
        creator_channel_id: entry.creator.claim_id,
        blocked_channel_id: entry.blocked.claim_id,
        blocked_channel_name: entry.blocked.name,
    })
}

pub async fn unblock<B: BlocklistStore>(
    blocklists: &BlocklistService<B>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: BlockArgs = parse_params(params)?;
    blocklists
        .unblock(
            &args.auth,
            args.creator_channel_id.as_deref(),
            &args.blocked_channel_id,
        )
        .await?;
    to_result(UnBlockResponse {
        creator_channel_id: args
            .creator_channel_id
            .unwrap_or_else(|| args.auth.channel_id.clone()),
        blocked_channel_id: args.blocked_channel_id,
    })
}
