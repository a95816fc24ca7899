//! Shared types for the restmcp bridge.
//!
//! This crate contains the domain models and API types of the sample ledger
//! API that the bridge exposes as MCP tools.

/// Default port for the restmcp server.
pub const DEFAULT_PORT: u16 = 8080;

pub mod api;
pub mod ledger;

// Re-export commonly used types
pub use api::ErrorResponse;
pub use ledger::{Account, AccountId, AccountKind, Entry, EntryId};
