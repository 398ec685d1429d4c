// Channel identity - who is calling, and did they really sign the request.

pub mod channel_auth;
pub mod channel_models;

pub use channel_auth::*;
pub use channel_models::*;
