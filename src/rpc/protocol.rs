// Request/response envelope and argument parsing helpers.

use crate::core::errors::ModerationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"id": ..., "method": "service.Method", "params": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: u16,
    pub message: String,
}

impl From<&ModerationError> for RpcError {
    fn from(err: &ModerationError) -> Self {
        Self {
            code: err.class().status_code(),
            message: err.to_string(),
        }
    }
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, err: &ModerationError) -> Self {
        Self {
            id,
            result: None,
            error: Some(err.into()),
        }
    }
}

/// Decode method params; a missing params object reads as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ModerationError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| ModerationError::Validation(format!("invalid params: {}", e)))
}

pub fn to_result<T: Serialize>(value: T) -> Result<Value, ModerationError> {
    serde_json::to_value(value)
        .map_err(|e| ModerationError::StorageError(format!("encoding response: {}", e)))
}
