// Spam lists from a JSON file:
// { "comment_spammers": [claim_id, ...], "reaction_spammers": [claim_id, ...] }

use crate::core::spam::SpamRegistry;
use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
struct SpamListFile {
    #[serde(default)]
    comment_spammers: Vec<String>,
    #[serde(default)]
    reaction_spammers: Vec<String>,
}

/// Load the registry once at start-up. A missing file yields an empty
/// registry; a malformed one is an error.
pub fn load_spam_registry(path: impl AsRef<Path>) -> anyhow::Result<SpamRegistry> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Spam list file not found, no channels distrusted");
        return Ok(SpamRegistry::default());
    }

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let lists: SpamListFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;

    Ok(SpamRegistry::new(
        lists.comment_spammers.into_iter().map(|id| id.trim().to_string()),
        lists.reaction_spammers.into_iter().map(|id| id.trim().to_string()),
    ))
}
