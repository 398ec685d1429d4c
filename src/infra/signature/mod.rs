pub mod remote_verifier;

pub use remote_verifier::{AllowAllVerifier, RemoteSignatureVerifier};
