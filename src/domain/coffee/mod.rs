//! Coffee inventory domain.
//!
//! - `coffee` - The `Coffee` record, its mutable details, and list filtering
//! - `errors` - Typed failure values returned by inventory operations
//! - `naming` - Case-insensitive name comparison and duplicate-name suggestions
//! - `seed` - The inventory a fresh process starts with

mod coffee;
mod errors;
mod naming;
mod seed;

pub use coffee::{Coffee, CoffeeDetails, CoffeeFilter};
pub use errors::{CoffeeAlreadyExists, CoffeeNotFound};
pub use naming::{names_match, suggest_available_name};
pub use seed::initial_coffees;
