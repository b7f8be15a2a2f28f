//! NDJSON endpoint handler.
//!
//! Request lines are dispatched as soon as they arrive, each in its own task,
//! while the response body streams out. Lines from concurrent requests may
//! interleave; each request's own lines keep their order.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::adapters::rpc::{
    parse_request, Exit, Frame, NdjsonCodec, RequestRejection, ResponseLine, RpcRegistry,
    NDJSON_CONTENT_TYPE,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcLimits {
    /// Longest accepted request line, in bytes.
    pub max_line_bytes: usize,
    /// Response lines buffered before producers wait for the client.
    pub output_buffer: usize,
}

impl Default for RpcLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024,
            output_buffer: 64,
        }
    }
}

/// Shared state for the RPC endpoint.
#[derive(Clone)]
pub struct RpcAppState {
    pub registry: Arc<RpcRegistry>,
    pub limits: RpcLimits,
}

impl RpcAppState {
    pub fn new(registry: RpcRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            limits: RpcLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RpcLimits) -> Self {
        self.limits = limits;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST handler: NDJSON requests in, NDJSON response lines out.
pub async fn handle_rpc(State(state): State<RpcAppState>, body: Body) -> Response {
    let (tx, rx) = mpsc::channel(state.limits.output_buffer.max(1));
    tokio::spawn(read_requests(state, body, tx));

    let lines = ReceiverStream::new(rx).map(|line| Ok::<_, Infallible>(line.to_ndjson()));
    (
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Reads request lines and spawns one task per request.
///
/// Returns when the body ends or the client stops reading. Request tasks
/// hold their own sender, so the response ends once the last one finishes.
async fn read_requests(state: RpcAppState, body: Body, out: mpsc::Sender<ResponseLine>) {
    let bytes = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
    let mut frames = FramedRead::new(
        StreamReader::new(bytes),
        NdjsonCodec::new(state.limits.max_line_bytes),
    );

    while let Some(frame) = frames.next().await {
        let reply = match frame {
            Ok(Frame::Line(line)) if line.trim().is_empty() => continue,
            Ok(Frame::Line(line)) => match parse_request(&line) {
                Ok(request) => {
                    tracing::debug!(request.id = %request.id, tag = %request.tag, "request received");
                    let registry = Arc::clone(&state.registry);
                    let out = out.clone();
                    tokio::spawn(async move { registry.execute(request, &out).await });
                    continue;
                }
                Err(rejection) => rejection_line(rejection),
            },
            Ok(Frame::Oversized { len }) => {
                tracing::warn!(len, limit = state.limits.max_line_bytes, "request line too long");
                ResponseLine::defect(format!(
                    "request line of {} bytes exceeds the {} byte limit",
                    len, state.limits.max_line_bytes
                ))
            }
            Ok(Frame::InvalidUtf8) => {
                tracing::warn!("request line is not valid UTF-8");
                ResponseLine::defect("request line is not valid UTF-8")
            }
            Err(e) => {
                tracing::warn!(error = %e, "request body failed");
                break;
            }
        };

        if out.send(reply).await.is_err() {
            break;
        }
    }
}

fn rejection_line(rejection: RequestRejection) -> ResponseLine {
    tracing::warn!(error = %rejection.error, "malformed request line");
    match rejection.request_id {
        Some(id) => ResponseLine::exit(id, Exit::failure(rejection.error.to_value())),
        None => ResponseLine::defect(rejection.error.to_string()),
    }
}
