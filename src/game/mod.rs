//! Game state: player records, the item catalog, and the pure engine that
//! mutates them, plus read-only text views and the persistence wrapper.

pub mod catalog;
pub mod engine;
pub mod errors;
pub mod players;
pub mod types;
pub mod views;

pub use catalog::{ItemCatalog, ItemDefinition, ItemEffect, ItemKind};
pub use errors::GameError;
pub use players::PlayerStore;
pub use types::UserRecord;
