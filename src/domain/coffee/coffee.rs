//! Coffee record and its value objects.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::CoffeeId;

use super::naming::names_match;

/// A coffee product in the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coffee {
    pub id: CoffeeId,
    pub name: String,
    pub origin: String,
    pub roast: String,
    pub price: f64,
    pub weight: String,
    pub description: String,
    pub in_stock: bool,
}

impl Coffee {
    /// Builds a record from an id and the full set of mutable fields.
    pub fn from_details(id: CoffeeId, details: CoffeeDetails) -> Self {
        Self {
            id,
            name: details.name,
            origin: details.origin,
            roast: details.roast,
            price: details.price,
            weight: details.weight,
            description: details.description,
            in_stock: details.in_stock,
        }
    }

    /// Returns the mutable fields of this record.
    pub fn details(&self) -> CoffeeDetails {
        CoffeeDetails {
            name: self.name.clone(),
            origin: self.origin.clone(),
            roast: self.roast.clone(),
            price: self.price,
            weight: self.weight.clone(),
            description: self.description.clone(),
            in_stock: self.in_stock,
        }
    }
}

/// Every field of a coffee except its id.
///
/// Used for creation and for wholesale replacement on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeDetails {
    pub name: String,
    pub origin: String,
    pub roast: String,
    pub price: f64,
    pub weight: String,
    pub description: String,
    pub in_stock: bool,
}

/// Filter for listing coffees. Present criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoffeeFilter {
    /// Exact id match.
    pub id: Option<CoffeeId>,
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
}

impl CoffeeFilter {
    /// A filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the filter to a single id.
    pub fn with_id(mut self, id: CoffeeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts the filter to names containing `fragment`, ignoring case.
    pub fn with_name(mut self, fragment: impl Into<String>) -> Self {
        self.name = Some(fragment.into());
        self
    }

    /// Returns true when `coffee` satisfies every present criterion.
    pub fn matches(&self, coffee: &Coffee) -> bool {
        let id_ok = self.id.map_or(true, |id| coffee.id == id);
        let name_ok = self.name.as_deref().map_or(true, |fragment| {
            coffee.name.to_lowercase().contains(&fragment.to_lowercase())
        });
        id_ok && name_ok
    }

    /// Returns true when a record named `name` would collide with `coffee`.
    pub(crate) fn same_name(coffee: &Coffee, name: &str) -> bool {
        names_match(&coffee.name, name)
    }
}
