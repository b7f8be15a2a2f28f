use serde::Serialize;
use thiserror::Error;

use crate::domain::foundation::ConversationId;

/// The addressed conversation does not exist.
///
/// Also reported when the completion capability fails mid-reply, so clients
/// only ever see this one error from `sendUserMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "_tag")]
#[error("conversation {id} not found")]
pub struct ConversationNotFound {
    pub id: ConversationId,
}
