//! Wire protocol: request lines in, response lines out.
//!
//! Every response line names the request it belongs to, so many requests can
//! share one response body and a client can route lines by `requestId`.
//!
//! ```text
//! -> {"id":"1","tag":"listCoffees","payload":{"name":"kona"}}
//! <- {"_tag":"Exit","requestId":"1","exit":{"_tag":"Success","value":[...]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Media type of request and response bodies.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// ════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Client-chosen correlation id, echoed on every response line.
    pub id: String,
    /// Procedure name.
    pub tag: String,
    /// Procedure input. Absent is treated as `null`.
    #[serde(default)]
    pub payload: Value,
}

impl RpcRequest {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            payload,
        }
    }
}

/// A request line that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRejection {
    /// Set when the line carried a usable `id`, so the failure can be
    /// reported against it.
    pub request_id: Option<String>,
    pub error: ProtocolError,
}

/// Decodes one request line.
pub fn parse_request(line: &str) -> Result<RpcRequest, RequestRejection> {
    let value: Value = serde_json::from_str(line).map_err(|e| RequestRejection {
        request_id: None,
        error: ProtocolError::malformed_request(format!("line is not valid JSON: {}", e)),
    })?;

    let request_id = value.get("id").and_then(Value::as_str).map(str::to_string);

    serde_json::from_value(value).map_err(|e| RequestRejection {
        request_id,
        error: ProtocolError::malformed_request(e.to_string()),
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════

/// Terminal outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_tag")]
pub enum Exit {
    Success { value: Value },
    Failure { error: Value },
}

impl Exit {
    pub fn success(value: Value) -> Self {
        Exit::Success { value }
    }

    pub fn failure(error: Value) -> Self {
        Exit::Failure { error }
    }

    /// Failure caused by an unexpected fault rather than a declared error.
    pub fn defect(message: impl Into<String>) -> Self {
        Exit::Failure {
            error: json!({ "_tag": "Defect", "defect": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Exit::Success { .. })
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_tag")]
pub enum ResponseLine {
    /// A streamed value. Exactly one value per line.
    Chunk {
        #[serde(rename = "requestId")]
        request_id: String,
        values: Vec<Value>,
    },
    /// The last line for a request.
    Exit {
        #[serde(rename = "requestId")]
        request_id: String,
        exit: Exit,
    },
    /// A problem that cannot be attributed to any request.
    Defect { defect: String },
}

impl ResponseLine {
    pub fn chunk(request_id: impl Into<String>, value: Value) -> Self {
        ResponseLine::Chunk {
            request_id: request_id.into(),
            values: vec![value],
        }
    }

    pub fn exit(request_id: impl Into<String>, exit: Exit) -> Self {
        ResponseLine::Exit {
            request_id: request_id.into(),
            exit,
        }
    }

    pub fn defect(message: impl Into<String>) -> Self {
        ResponseLine::Defect {
            defect: message.into(),
        }
    }

    /// The request this line belongs to, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ResponseLine::Chunk { request_id, .. } | ResponseLine::Exit { request_id, .. } => {
                Some(request_id)
            }
            ResponseLine::Defect { .. } => None,
        }
    }

    /// Serializes the line, newline included.
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("failed to encode response line: {}", e);
            r#"{"_tag":"Defect","defect":"unencodable response line"}"#.to_string()
        });
        line.push('\n');
        line
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Protocol errors
// ════════════════════════════════════════════════════════════════════════════

/// Category of a protocol-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolErrorKind {
    /// The request line itself is unusable.
    MalformedRequest,
    /// No procedure is registered under the tag.
    UnknownTag,
    /// The payload does not match the procedure's input shape.
    MalformedPayload,
    /// A result could not be encoded.
    Encode,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolErrorKind::MalformedRequest => "malformed request",
            ProtocolErrorKind::UnknownTag => "unknown tag",
            ProtocolErrorKind::MalformedPayload => "malformed payload",
            ProtocolErrorKind::Encode => "encode failure",
        };
        f.write_str(name)
    }
}

/// A request rejected before (or after) reaching a service.
///
/// Distinct from domain errors: this is reported as
/// `{"_tag":"ProtocolError","kind":...,"message":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "_tag")]
#[error("{kind}: {message}")]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::MalformedRequest, message)
    }

    pub fn unknown_tag(tag: &str) -> Self {
        Self::new(ProtocolErrorKind::UnknownTag, format!("no procedure named '{}'", tag))
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::MalformedPayload, message)
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::Encode, message)
    }

    /// JSON form used in a `Failure` exit.
    pub fn to_value(&self) -> Value {
        json!({
            "_tag": "ProtocolError",
            "kind": self.kind,
            "message": self.message,
        })
    }
}
