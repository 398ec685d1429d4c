// `settings.*` methods: muted words.

use crate::core::channels::Authorization;
use crate::core::errors::ModerationError;
use crate::core::muted_words::{MutedWordService, MutedWordStore};
use crate::rpc::protocol::{parse_params, to_result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct WordsArgs {
    #[serde(flatten)]
    pub auth: Authorization,
    /// Comma-delimited.
    #[serde(default)]
    pub words: String,
}

#[derive(Debug, Serialize)]
pub struct WordsResponse {
    pub words: Vec<String>,
}

pub async fn block_word<M: MutedWordStore>(
    muted_words: &MutedWordService<M>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: WordsArgs = parse_params(params)?;
    let words = muted_words.add(&args.auth, &args.words).await?;
    to_result(WordsResponse { words })
}

pub async fn unblock_word<M: MutedWordStore>(
    muted_words: &MutedWordService<M>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: WordsArgs = parse_params(params)?;
    let words = muted_words.remove(&args.auth, &args.words).await?;
    to_result(WordsResponse { words })
}

pub async fn list_blocked_words<M: MutedWordStore>(
    muted_words: &MutedWordService<M>,
    params: Value,
) -> Result<Value, ModerationError> {
    let args: WordsArgs = parse_params(params)?;
    let words = muted_words.list(&args.auth).await?;
    to_result(WordsResponse { words })
}
