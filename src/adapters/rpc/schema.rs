//! Payload and result shapes for every procedure.
//!
//! Inputs are decoded strictly by type (an integer field will not accept a
//! string or a fraction). Unknown extra fields are ignored.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::coffee::{CoffeeDetails, CoffeeFilter};
use crate::domain::foundation::{CoffeeId, ConversationId};

use super::protocol::ProtocolError;

/// Decodes a procedure payload. An absent payload decodes like `{}`.
pub fn decode_payload<T: DeserializeOwned>(payload: Value) -> Result<T, ProtocolError> {
    let payload = match payload {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ProtocolError::malformed_payload(e.to_string()))
}

/// Encodes a success value, chunk or declared error.
pub fn encode<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(|e| ProtocolError::encode(e.to_string()))
}

/// Input of procedures that take nothing. Accepts any payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Void;

impl<'de> Deserialize<'de> for Void {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Void)
    }
}

/// Error type of procedures that cannot fail with a declared error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoError {}

// ════════════════════════════════════════════════════════════════════════════
// Inventory
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListCoffeesRequest {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<ListCoffeesRequest> for CoffeeFilter {
    fn from(request: ListCoffeesRequest) -> Self {
        CoffeeFilter {
            id: request.id.map(CoffeeId::new),
            name: request.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoffeeRequest {
    pub name: String,
    pub origin: String,
    pub roast: String,
    pub price: f64,
    pub weight: String,
    pub description: String,
    pub in_stock: bool,
}

impl From<CreateCoffeeRequest> for CoffeeDetails {
    fn from(r: CreateCoffeeRequest) -> Self {
        CoffeeDetails {
            name: r.name,
            origin: r.origin,
            roast: r.roast,
            price: r.price,
            weight: r.weight,
            description: r.description,
            in_stock: r.in_stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCoffeeRequest {
    pub id: i64,
    pub name: String,
    pub origin: String,
    pub roast: String,
    pub price: f64,
    pub weight: String,
    pub description: String,
    pub in_stock: bool,
}

impl UpdateCoffeeRequest {
    pub fn into_parts(self) -> (CoffeeId, CoffeeDetails) {
        (
            CoffeeId::new(self.id),
            CoffeeDetails {
                name: self.name,
                origin: self.origin,
                roast: self.roast,
                price: self.price,
                weight: self.weight,
                description: self.description,
                in_stock: self.in_stock,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeleteCoffeeRequest {
    pub id: i64,
}

// ════════════════════════════════════════════════════════════════════════════
// Conversation
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendUserMessageRequest {
    pub conversation_id: i64,
    pub message: String,
}
