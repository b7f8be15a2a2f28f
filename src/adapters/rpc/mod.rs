//! RPC layer: wire protocol, payload schemas, dispatcher and client.

pub mod client;
pub mod codec;
pub mod procedures;
pub mod protocol;
pub mod registry;
pub mod schema;

pub use client::{ClientError, PendingReply, Reply, ReplyEvent, RpcClient};
pub use codec::{Frame, NdjsonCodec};
pub use procedures::{procedures, tags, Services};
pub use protocol::{
    parse_request, Exit, ProtocolError, ProtocolErrorKind, RequestRejection, ResponseLine,
    RpcRequest, NDJSON_CONTENT_TYPE,
};
pub use registry::{Outcome, RpcRegistry, ValueStream};
