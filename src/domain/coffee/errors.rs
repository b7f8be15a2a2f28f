//! Inventory failure values.
//!
//! These are returned as data, never raised. On the wire each one carries an
//! `_tag` field with its type name so clients can tell them apart from
//! success values and from each other.

use serde::Serialize;
use thiserror::Error;

use crate::domain::foundation::CoffeeId;

/// A coffee with the requested name already exists (ignoring case).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "_tag")]
#[error("coffee '{name}' already exists, try '{suggestion}'")]
pub struct CoffeeAlreadyExists {
    /// The name that was requested.
    pub name: String,
    /// A free name derived from the requested one.
    pub suggestion: String,
}

/// No coffee with the given id exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "_tag")]
#[error("coffee {id} not found")]
pub struct CoffeeNotFound {
    pub id: CoffeeId,
}
