//! API handlers.

pub mod ledger;
pub mod mcp;
