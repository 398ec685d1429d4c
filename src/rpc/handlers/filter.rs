// `filter.*` methods, called by the comment/reaction ingestion pipeline.
// These are not signed: the caller is trusted infrastructure.

use crate::core::blocklist::BlocklistStore;
use crate::core::channels::validate_claim_id;
use crate::core::errors::ModerationError;
use crate::core::muted_words::MutedWordStore;
use crate::core::screening::ScreeningService;
use crate::rpc::protocol::{parse_params, to_result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ScreenCommentArgs {
    #[serde(default)]
    pub commenter_channel_id: String,
    #[serde(default)]
    pub creator_channel_id: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ScreenReactionArgs {
    #[serde(default)]
    pub reactor_channel_id: String,
}

pub async fn screen_comment<B: BlocklistStore, M: MutedWordStore>(
    screening: &ScreeningService<B, M>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: ScreenCommentArgs = parse_params(params)?;
    validate_claim_id("commenter_channel_id", &args.commenter_channel_id)?;
    validate_claim_id("creator_channel_id", &args.creator_channel_id)?;

    let verdict = screening
        .screen_comment(
            &args.commenter_channel_id,
            &args.creator_channel_id,
            &args.comment,
        )
        .await?;
    to_result(verdict)
}

pub fn screen_reaction<B: BlocklistStore, M: MutedWordStore>(
    screening: &ScreeningService<B, M>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: ScreenReactionArgs = parse_params(params)?;
    validate_claim_id("reactor_channel_id", &args.reactor_channel_id)?;
    to_result(screening.screen_reaction(&args.reactor_channel_id))
}
