// Shared error taxonomy for every moderation feature.
//
// Services never return transport-specific errors. The rpc layer turns an
// `ErrorClass` into a status code; nothing below it knows about status codes.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModerationError {
    /// Malformed or missing fields. The caller has to fix the request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Signature or identity mismatch. Deliberately carries no detail.
    #[error("could not authenticate channel signature")]
    Authentication,

    /// The caller is authenticated but lacks authority over the target.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// State machine violation (duplicate pending invite, accept on a
    /// rejected invite, rescind by someone other than the inviter).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator service (signature verifier) could not be reached.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Coarse classification used when reporting an error to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Authentication,
    NotFound,
    Conflict,
    Server,
}

impl ErrorClass {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::BadRequest => 400,
            ErrorClass::Authentication => 401,
            ErrorClass::NotFound => 404,
            ErrorClass::Conflict => 409,
            ErrorClass::Server => 500,
        }
    }
}

impl ModerationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ModerationError::Validation(_) => ErrorClass::BadRequest,
            ModerationError::Authentication | ModerationError::NotAuthorized(_) => {
                ErrorClass::Authentication
            }
            ModerationError::Conflict(_) => ErrorClass::Conflict,
            ModerationError::NotFound(_) => ErrorClass::NotFound,
            ModerationError::Upstream(_) | ModerationError::StorageError(_) => ErrorClass::Server,
        }
    }

    /// Only infrastructure failures are worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModerationError::StorageError(_) | ModerationError::Upstream(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_map_to_status_codes() {
        assert_eq!(
            ModerationError::Validation("x".into()).class().status_code(),
            400
        );
        assert_eq!(ModerationError::Authentication.class().status_code(), 401);
        assert_eq!(
            ModerationError::NotFound("list".into()).class().status_code(),
            404
        );
        assert_eq!(
            ModerationError::Conflict("dup".into()).class().status_code(),
            409
        );
        assert_eq!(
            ModerationError::StorageError("disk".into())
                .class()
                .status_code(),
            500
        );
    }

    #[test]
    fn test_only_infrastructure_errors_are_retryable() {
        assert!(ModerationError::StorageError("busy".into()).is_retryable());
        assert!(ModerationError::Upstream("timeout".into()).is_retryable());
        assert!(!ModerationError::Conflict("dup".into()).is_retryable());
        assert!(!ModerationError::Authentication.is_retryable());
    }

    #[test]
    fn test_authentication_message_does_not_leak_detail() {
        assert_eq!(
            ModerationError::Authentication.to_string(),
            "could not authenticate channel signature"
        );
    }
}
