//! Dispatcher: maps request tags to typed handlers.
//!
//! A handler is registered with its input, success, chunk and error types.
//! The registry erases them behind JSON so the transport only ever sees
//! [`Outcome`] values. Two shapes are supported:
//!
//! - **unary**: one `Exit` line per request
//! - **streaming**: zero or more `Chunk` lines, then one `Exit` line

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::protocol::{Exit, ProtocolError, ResponseLine, RpcRequest};
use super::schema::{decode_payload, encode};

/// Encoded chunks of a streaming handler. `Err` carries an encoded error and
/// ends the stream.
pub type ValueStream = BoxStream<'static, Result<Value, Value>>;

/// What a handler produced for one request.
pub enum Outcome {
    Exit(Exit),
    Stream(ValueStream),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Exit(exit) => f.debug_tuple("Exit").field(exit).finish(),
            Outcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Outcome, ProtocolError>> + Send + Sync>;

/// Tag → handler table.
#[derive(Clone, Default)]
pub struct RpcRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that answers with a single value or error.
    pub fn unary<P, S, E, F, Fut>(mut self, tag: &'static str, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        S: Serialize + Send + 'static,
        E: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |payload| {
            let handler = Arc::clone(&handler);
            async move {
                let input: P = decode_payload(payload)?;
                let exit = match handler(input).await {
                    Ok(value) => Exit::success(encode(&value)?),
                    Err(error) => Exit::failure(encode(&error)?),
                };
                Ok(Outcome::Exit(exit))
            }
            .boxed()
        });
        self.insert(tag, erased);
        self
    }

    /// Registers a handler that answers with a stream of chunks.
    ///
    /// The handler may fail before the stream exists (for example, an unknown
    /// id); that becomes a plain `Failure` exit with no chunks.
    pub fn streaming<P, I, E, St, F, Fut>(mut self, tag: &'static str, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        I: Serialize + Send + 'static,
        E: Serialize + Send + 'static,
        St: Stream<Item = Result<I, E>> + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<St, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |payload| {
            let handler = Arc::clone(&handler);
            async move {
                let input: P = decode_payload(payload)?;
                match handler(input).await {
                    Ok(stream) => {
                        let encoded = stream.map(|item| match item {
                            Ok(chunk) => encode(&chunk).map_err(|e| e.to_value()),
                            Err(error) => Err(encode(&error).unwrap_or_else(|e| e.to_value())),
                        });
                        Ok(Outcome::Stream(encoded.boxed()))
                    }
                    Err(error) => Ok(Outcome::Exit(Exit::failure(encode(&error)?))),
                }
            }
            .boxed()
        });
        self.insert(tag, erased);
        self
    }

    fn insert(&mut self, tag: &'static str, handler: Handler) {
        if self.handlers.insert(tag, handler).is_some() {
            tracing::warn!(tag, "procedure registered twice, keeping the latest handler");
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decodes the payload and invokes the handler bound to `tag`.
    pub async fn dispatch(&self, tag: &str, payload: Value) -> Result<Outcome, ProtocolError> {
        let Some(handler) = self.handlers.get(tag) else {
            tracing::warn!(tag, "request for unknown procedure");
            return Err(ProtocolError::unknown_tag(tag));
        };
        handler(payload).await
    }

    /// Runs one request to completion, writing its response lines to `out`.
    ///
    /// Stops early, dropping the handler's stream, once `out` is closed. A
    /// panicking handler is reported as a defect exit for this request only.
    pub async fn execute(&self, request: RpcRequest, out: &mpsc::Sender<ResponseLine>) {
        let request_id = request.id.clone();
        let run = AssertUnwindSafe(self.drive(request, out)).catch_unwind();

        tokio::select! {
            _ = out.closed() => {
                tracing::debug!(request.id = %request_id, "response consumer went away, request cancelled");
            }
            result = run => {
                if let Err(panic) = result {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(request.id = %request_id, panic = %message, "procedure panicked");
                    let _ = out
                        .send(ResponseLine::exit(request_id, Exit::defect(message)))
                        .await;
                }
            }
        }
    }

    async fn drive(&self, request: RpcRequest, out: &mpsc::Sender<ResponseLine>) {
        let RpcRequest { id, tag, payload } = request;

        let outcome = match self.dispatch(&tag, payload).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::debug!(request.id = %id, %tag, error = %error, "request rejected");
                Outcome::Exit(Exit::failure(error.to_value()))
            }
        };

        let exit = match outcome {
            Outcome::Exit(exit) => exit,
            Outcome::Stream(mut stream) => {
                let mut exit = Exit::success(Value::Null);
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(value) => {
                            if out.send(ResponseLine::chunk(id.as_str(), value)).await.is_err() {
                                return;
                            }
                        }
                        Err(error) => {
                            exit = Exit::failure(error);
                            break;
                        }
                    }
                }
                exit
            }
        };

        let _ = out.send(ResponseLine::exit(id, exit)).await;
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "procedure panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rpc::protocol::ProtocolErrorKind;
    use crate::adapters::rpc::schema::Void;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    #[serde(tag = "_tag")]
    struct Negative {
        sum: i64,
    }

    #[derive(Deserialize)]
    struct Count {
        upto: u32,
    }

    #[derive(Serialize)]
    #[serde(tag = "_tag")]
    struct TooMany {}

    fn registry() -> RpcRegistry {
        RpcRegistry::new()
            .unary("add", |input: Add| async move {
                let sum = input.a + input.b;
                if sum < 0 {
                    Err(Negative { sum })
                } else {
                    Ok(sum)
                }
            })
            .streaming("count", |input: Count| async move {
                if input.upto > 5 {
                    return Err(TooMany {});
                }
                Ok(futures::stream::iter((1..=input.upto).map(Ok::<_, TooMany>)))
            })
            .streaming("failsHalfway", |_: Void| async move {
                Ok::<_, TooMany>(futures::stream::iter(vec![Ok(1), Err(TooMany {}), Ok(2)]))
            })
            .unary("explode", |_: Void| async move {
                if true {
                    panic!("boom");
                }
                Ok::<_, TooMany>(())
            })
    }

    async fn run(registry: &RpcRegistry, request: RpcRequest) -> Vec<ResponseLine> {
        let (tx, mut rx) = mpsc::channel(16);
        registry.execute(request, &tx).await;
        drop(tx);
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    mod dispatch {
        use super::*;

        #[tokio::test]
        async fn unary_success_is_encoded() {
            let outcome = registry().dispatch("add", json!({"a": 2, "b": 3})).await.unwrap();
            match outcome {
                Outcome::Exit(exit) => assert_eq!(exit, Exit::success(json!(5))),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        #[tokio::test]
        async fn unary_domain_error_is_a_failure_value() {
            let outcome = registry().dispatch("add", json!({"a": 2, "b": -3})).await.unwrap();
            match outcome {
                Outcome::Exit(exit) => {
                    assert_eq!(exit, Exit::failure(json!({"_tag": "Negative", "sum": -1})))
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        #[tokio::test]
        async fn unknown_tag_is_a_protocol_error() {
            let err = registry().dispatch("nope", Value::Null).await.unwrap_err();
            assert_eq!(err.kind, ProtocolErrorKind::UnknownTag);
        }

        #[tokio::test]
        async fn bad_payload_is_a_protocol_error() {
            let err = registry().dispatch("add", json!({"a": "two"})).await.unwrap_err();
            assert_eq!(err.kind, ProtocolErrorKind::MalformedPayload);
        }

        #[test]
        fn lists_registered_tags() {
            let registry = registry();
            assert_eq!(registry.tags(), vec!["add", "count", "explode", "failsHalfway"]);
            assert!(registry.contains("count"));
            assert!(!registry.contains("Count"));
        }
    }

    mod execute {
        use super::*;

        #[tokio::test]
        async fn unary_writes_single_exit_line() {
            let lines = run(&registry(), RpcRequest::new("r1", "add", json!({"a": 1, "b": 1}))).await;
            assert_eq!(lines, vec![ResponseLine::exit("r1", Exit::success(json!(2)))]);
        }

        #[tokio::test]
        async fn stream_writes_chunks_then_void_exit() {
            let lines = run(&registry(), RpcRequest::new("s", "count", json!({"upto": 3}))).await;
            assert_eq!(
                lines,
                vec![
                    ResponseLine::chunk("s", json!(1)),
                    ResponseLine::chunk("s", json!(2)),
                    ResponseLine::chunk("s", json!(3)),
                    ResponseLine::exit("s", Exit::success(Value::Null)),
                ]
            );
        }

        #[tokio::test]
        async fn stream_that_fails_to_start_has_no_chunks() {
            let lines = run(&registry(), RpcRequest::new("s", "count", json!({"upto": 9}))).await;
            assert_eq!(
                lines,
                vec![ResponseLine::exit("s", Exit::failure(json!({"_tag": "TooMany"})))]
            );
        }

        #[tokio::test]
        async fn stream_error_ends_the_stream() {
            let lines = run(&registry(), RpcRequest::new("f", "failsHalfway", Value::Null)).await;
            assert_eq!(
                lines,
                vec![
                    ResponseLine::chunk("f", json!(1)),
                    ResponseLine::exit("f", Exit::failure(json!({"_tag": "TooMany"}))),
                ]
            );
        }

        #[tokio::test]
        async fn protocol_error_becomes_failure_exit() {
            let lines = run(&registry(), RpcRequest::new("x", "missing", Value::Null)).await;
            assert_eq!(lines.len(), 1);
            match &lines[0] {
                ResponseLine::Exit { request_id, exit: Exit::Failure { error } } => {
                    assert_eq!(request_id, "x");
                    assert_eq!(error["_tag"], "ProtocolError");
                    assert_eq!(error["kind"], "UnknownTag");
                }
                other => panic!("unexpected line: {:?}", other),
            }
        }

        #[tokio::test]
        async fn panic_becomes_defect_exit() {
            let lines = run(&registry(), RpcRequest::new("p", "explode", Value::Null)).await;
            assert_eq!(lines, vec![ResponseLine::exit("p", Exit::defect("boom"))]);
        }

        #[tokio::test]
        async fn closed_output_stops_the_stream() {
            let registry = RpcRegistry::new().streaming("forever", |_: Void| async move {
                Ok::<_, TooMany>(futures::stream::repeat(0).map(Ok))
            });
            let (tx, rx) = mpsc::channel(1);
            drop(rx);

            tokio::time::timeout(
                std::time::Duration::from_secs(1),
                registry.execute(RpcRequest::new("f", "forever", Value::Null), &tx),
            )
            .await
            .expect("execute returns once the consumer is gone");
        }
    }
}
