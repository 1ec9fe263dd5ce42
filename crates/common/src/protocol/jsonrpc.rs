// JSON-RPC 2.0 request/response types for the editor's stdio protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CURRENT_PROTOCOL_VERSION: &str = "folio-rpc.v1";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[CURRENT_PROTOCOL_VERSION];

#[must_use]
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

/// A JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request ID: integer, string, or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Server-defined: the editor rejected the operation. `data.code` says why.
pub const EDIT_FAILED: i32 = -32010;

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            protocol_version: Some(CURRENT_PROTOCOL_VERSION.to_string()),
            method: method.into(),
            params,
            id,
        }
    }
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_current_protocol_version() {
        let request = Request::new("doc.read", Some(json!({"doc_id": "a"})), RequestId::Number(7));
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["protocol_version"], CURRENT_PROTOCOL_VERSION);
        assert_eq!(encoded["id"], 7);
    }

    #[test]
    fn request_id_accepts_string_number_and_null() {
        let ids: Vec<RequestId> = serde_json::from_str(r#"[1, "abc", null]"#).unwrap();
        assert_eq!(
            ids,
            vec![RequestId::Number(1), RequestId::String("abc".into()), RequestId::Null]
        );
    }

    #[test]
    fn success_response_omits_error() {
        let response = Response::success(RequestId::Number(1), json!({"ok": true}));
        let encoded = serde_json::to_value(&response).unwrap();
        assert!(encoded.get("error").is_none());
        assert_eq!(encoded["result"]["ok"], true);
    }

    #[test]
    fn only_current_version_is_supported() {
        assert!(is_supported_protocol_version("folio-rpc.v1"));
        assert!(!is_supported_protocol_version("folio-rpc.v0"));
    }
}
