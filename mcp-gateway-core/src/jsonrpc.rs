//! # JSON-RPC 2.0 Envelope
//!
//! Request/response/error types shared between the gateway's HTTP layer and
//! this crate's dispatch logic. Parsing/serialization only; method routing
//! lives in the gateway crate's MCP router.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("method not found: {method}"),
            data: None,
        }
    }

    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.jsonrpc_code(),
            message: message.into(),
            data: Some(serde_json::json!({ "kind": kind.as_str() })),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_default_params_and_id() {
        let parsed: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"tools/list"}"#).unwrap();
        assert_eq!(parsed.method, "tools/list");
        assert_eq!(parsed.params, Value::Null);
        assert_eq!(parsed.id, None);
    }

    #[test]
    fn success_response_omits_error_field() {
        let response = JsonRpcResponse::success(Some(Value::from(1)), serde_json::json!({}));
        let text = serde_json::to_string(&response).unwrap();
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn failure_response_omits_result_field() {
        let response =
            JsonRpcResponse::failure(None, JsonRpcError::method_not_found("missing"));
        let text = serde_json::to_string(&response).unwrap();
        assert!(!text.contains("\"result\""));
    }
}
