// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "errors.rs"]
pub mod errors;

#[path = "channels/mod.rs"]
pub mod channels;

#[path = "delegation/mod.rs"]
pub mod delegation;

#[path = "blocklist/mod.rs"]
pub mod blocklist;

#[path = "muted_words/muted_words_service.rs"]
pub mod muted_words;

#[path = "spam/spam_registry.rs"]
pub mod spam;

#[path = "screening/screening_service.rs"]
pub mod screening;
