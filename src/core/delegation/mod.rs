// Delegated moderation - who may moderate on behalf of whom.

pub mod delegation_models;
pub mod delegation_service;

pub use delegation_models::*;
pub use delegation_service::*;
