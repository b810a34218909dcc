//! Wire protocol shared between `hyperfand` and its RPC clients.
//!
//! The daemon speaks JSON-RPC 2.0 over a line-delimited TCP stream. This
//! crate carries the envelope types and the DTO shapes both the daemon and
//! any client need to agree on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum accepted line length for a single request (defensive bound, not
/// a protocol feature - the transport is trusted loopback).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

// ============================================================================
// JSON-RPC 2.0 envelope
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub result: RpcOutcome,
}

/// The result-wrapped outcome shape: both success and failure live under
/// `result`, distinguished by `success`. This is intentional - see the
/// daemon's wire documentation for why errors are not raised at the
/// top-level JSON-RPC `error` member.
#[derive(Debug, Clone, Serialize)]
pub struct RpcOutcome {
    pub success: bool,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, method: impl Into<String>, data: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: RpcOutcome {
                success: true,
                method: method.into(),
                data: Some(data),
                error: None,
            },
        }
    }

    pub fn error(id: Value, method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: RpcOutcome {
                success: false,
                method: method.into(),
                data: None,
                error: Some(RpcError {
                    code,
                    message: message.into(),
                }),
            },
        }
    }

    /// Build a parse-error response when a request couldn't even be
    /// decoded far enough to recover an id or method name.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, "unknown", -32700, message)
    }
}

// ============================================================================
// DTOs shared by telemetry and RPC responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempSensorDto {
    pub name: String,
    pub label: Option<String>,
    pub path: String,
    pub celsius: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanSensorDto {
    pub name: String,
    pub label: Option<String>,
    pub path: String,
    pub rpm: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwmControlDto {
    pub name: String,
    pub path: String,
    pub enable_path: String,
    pub duty_percent: Option<f32>,
    pub enable_mode: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuSampleDto {
    pub index: u32,
    pub name: String,
    pub vendor: String,
    pub pci_bus_id: Option<String>,
    pub temp_celsius: Option<f32>,
    pub fan_percent: Option<u32>,
    pub fan_rpm: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_shape() {
        let resp = JsonRpcResponse::success(Value::from(1), "ping", Value::from("pong"));
        assert!(resp.result.success);
        assert_eq!(resp.result.method, "ping");
    }
}
