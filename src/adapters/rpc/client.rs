//! RPC client that multiplexes many requests over one HTTP exchange.
//!
//! Requests are written as one NDJSON body. Response lines are routed to a
//! per-request channel by `requestId`; a request's channel closes after its
//! `Exit` line.

use futures::future::join_all;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use super::codec::{Frame, NdjsonCodec};
use super::protocol::{Exit, ResponseLine, RpcRequest, NDJSON_CONTENT_TYPE};

/// Longest response line the client accepts.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Errors raised by [`RpcClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("response ended before request {0} exited")]
    MissingExit(String),
}

/// Something received for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    Chunk(Value),
    Exit(Exit),
}

/// Everything received for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub chunks: Vec<Value>,
    pub exit: Exit,
}

/// Live view of one in-flight request.
#[derive(Debug)]
pub struct PendingReply {
    request_id: String,
    lines: mpsc::UnboundedReceiver<ResponseLine>,
    finished: bool,
}

impl PendingReply {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Next event, or `None` once the exit has been seen or the response
    /// ended.
    pub async fn next_event(&mut self) -> Option<ReplyEvent> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.recv().await? {
                ResponseLine::Chunk { values, .. } => {
                    // Lines carry one value each; anything else is tolerated
                    // by forwarding the first.
                    if let Some(value) = values.into_iter().next() {
                        return Some(ReplyEvent::Chunk(value));
                    }
                }
                ResponseLine::Exit { exit, .. } => {
                    self.finished = true;
                    return Some(ReplyEvent::Exit(exit));
                }
                ResponseLine::Defect { .. } => {}
            }
        }
    }

    /// Waits for the exit, collecting chunks on the way.
    pub async fn collect(mut self) -> Result<Reply, ClientError> {
        let mut chunks = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                ReplyEvent::Chunk(value) => chunks.push(value),
                ReplyEvent::Exit(exit) => return Ok(Reply { chunks, exit }),
            }
        }
        Err(ClientError::MissingExit(self.request_id))
    }
}

/// Client for the NDJSON RPC endpoint.
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Creates a client posting to `endpoint` (for example
    /// `http://localhost:8000/rpc`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends `calls` in one body and returns a pending reply per call, in
    /// the same order.
    pub async fn start(
        &self,
        calls: Vec<(String, Value)>,
    ) -> Result<Vec<PendingReply>, ClientError> {
        let requests: Vec<RpcRequest> = calls
            .into_iter()
            .map(|(tag, payload)| RpcRequest::new(self.allocate_id(), tag, payload))
            .collect();

        let mut body = String::new();
        for request in &requests {
            body.push_str(&serde_json::to_string(request)?);
            body.push('\n');
        }

        let mut table = HashMap::with_capacity(requests.len());
        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            let (tx, rx) = mpsc::unbounded_channel();
            table.insert(request.id.clone(), tx);
            pending.push(PendingReply {
                request_id: request.id,
                lines: rx,
                finished: false,
            });
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        let frames = FramedRead::new(StreamReader::new(bytes), NdjsonCodec::new(MAX_LINE_BYTES));
        tokio::spawn(demultiplex(frames, table));

        Ok(pending)
    }

    /// Sends several calls together and waits for all of them.
    pub async fn batch(&self, calls: Vec<(String, Value)>) -> Result<Vec<Reply>, ClientError> {
        let pending = self.start(calls).await?;
        join_all(pending.into_iter().map(PendingReply::collect))
            .await
            .into_iter()
            .collect()
    }

    /// Calls a unary procedure.
    pub async fn call(&self, tag: &str, payload: Value) -> Result<Exit, ClientError> {
        Ok(self.stream(tag, payload).await?.collect().await?.exit)
    }

    /// Starts a streaming procedure.
    pub async fn stream(&self, tag: &str, payload: Value) -> Result<PendingReply, ClientError> {
        let mut pending = self.start(vec![(tag.to_string(), payload)]).await?;
        pending
            .pop()
            .ok_or_else(|| ClientError::MissingExit(tag.to_string()))
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

async fn demultiplex<S>(frames: S, mut table: HashMap<String, mpsc::UnboundedSender<ResponseLine>>)
where
    S: futures::Stream<Item = io::Result<Frame>>,
{
    tokio::pin!(frames);
    while let Some(frame) = frames.next().await {
        let line = match frame {
            Ok(Frame::Line(line)) if line.trim().is_empty() => continue,
            Ok(Frame::Line(line)) => line,
            Ok(other) => {
                tracing::warn!(frame = ?other, "skipping unreadable response line");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "response body failed");
                break;
            }
        };

        let response: ResponseLine = match serde_json::from_str(&line) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable response line");
                continue;
            }
        };

        let Some(request_id) = response.request_id().map(str::to_string) else {
            if let ResponseLine::Defect { defect } = &response {
                tracing::warn!(defect = %defect, "server reported a defect");
            }
            continue;
        };

        let is_exit = matches!(response, ResponseLine::Exit { .. });
        match table.get(&request_id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::warn!(request.id = %request_id, "response for unknown request"),
        }
        if is_exit {
            table.remove(&request_id);
        }
        if table.is_empty() || table.values().all(|tx| tx.is_closed()) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(text: &str) -> impl futures::Stream<Item = io::Result<Frame>> {
        let frames: Vec<io::Result<Frame>> = text
            .lines()
            .map(|line| Ok(Frame::Line(line.to_string())))
            .collect();
        futures::stream::iter(frames)
    }

    fn pending(id: &str) -> (PendingReply, mpsc::UnboundedSender<ResponseLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PendingReply {
                request_id: id.to_string(),
                lines: rx,
                finished: false,
            },
            tx,
        )
    }

    #[tokio::test]
    async fn routes_interleaved_lines_by_request_id() {
        let (a, tx_a) = pending("a");
        let (b, tx_b) = pending("b");
        let table = HashMap::from([("a".to_string(), tx_a), ("b".to_string(), tx_b)]);

        let body = [
            ResponseLine::chunk("a", json!(1)),
            ResponseLine::chunk("b", json!("x")),
            ResponseLine::chunk("a", json!(2)),
            ResponseLine::exit("b", Exit::success(Value::Null)),
            ResponseLine::defect("stray"),
            ResponseLine::exit("a", Exit::success(Value::Null)),
        ]
        .iter()
        .map(ResponseLine::to_ndjson)
        .collect::<String>();

        demultiplex(lines(&body), table).await;

        let a = a.collect().await.unwrap();
        let b = b.collect().await.unwrap();
        assert_eq!(a.chunks, vec![json!(1), json!(2)]);
        assert_eq!(b.chunks, vec![json!("x")]);
        assert!(a.exit.is_success());
    }

    #[tokio::test]
    async fn missing_exit_is_reported() {
        let (a, tx_a) = pending("a");
        let table = HashMap::from([("a".to_string(), tx_a)]);

        demultiplex(lines(&ResponseLine::chunk("a", json!(1)).to_ndjson()), table).await;

        match a.collect().await {
            Err(ClientError::MissingExit(id)) => assert_eq!(id, "a"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_lines_are_skipped() {
        let (a, tx_a) = pending("a");
        let table = HashMap::from([("a".to_string(), tx_a)]);
        let body = format!(
            "not json\n\n{}",
            ResponseLine::exit("a", Exit::failure(json!({"_tag": "CoffeeNotFound", "id": 1}))).to_ndjson()
        );

        demultiplex(lines(&body), table).await;

        let reply = a.collect().await.unwrap();
        assert!(reply.chunks.is_empty());
        assert!(!reply.exit.is_success());
    }

    #[test]
    fn ids_are_unique_per_client() {
        let client = RpcClient::new("http://localhost:0/rpc");
        let first = client.allocate_id();
        let second = client.allocate_id();
        assert_ne!(first, second);
    }
}
