// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "database.rs"]
pub mod database;

#[path = "channels/sqlite_channel_directory.rs"]
pub mod channels;

#[path = "delegation/sqlite_delegation_store.rs"]
pub mod delegation;

#[path = "blocklist/sqlite_blocklist_store.rs"]
pub mod blocklist;

#[path = "muted_words/sqlite_muted_word_store.rs"]
pub mod muted_words;

#[path = "signature/mod.rs"]
pub mod signature;

#[path = "spam/json_spam_lists.rs"]
pub mod spam;
