// Shared blocklists - collaborative block-lists with an invite state machine.

pub mod blocklist_models;
pub mod blocklist_service;

pub use blocklist_models::*;
pub use blocklist_service::*;
