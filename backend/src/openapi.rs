//! OpenAPI documentation configuration.
//!
//! The same document drives Swagger UI and the MCP capability bridge.

use restmcp_types::api::{
    AccountListResponse, AccountQuery, AccountResponse, CreateAccountRequest, EntryListResponse,
    EntryQuery, EntryResponse, ErrorResponse, RecordEntryRequest,
};
use restmcp_types::ledger::{Account, AccountKind, Entry};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::ledger::create_account,
        crate::api::ledger::search_accounts,
        crate::api::ledger::get_account,
        crate::api::ledger::record_entry,
        crate::api::ledger::search_entries,
    ),
    components(
        schemas(
            Account,
            AccountKind,
            Entry,
            CreateAccountRequest,
            AccountQuery,
            AccountResponse,
            AccountListResponse,
            RecordEntryRequest,
            EntryQuery,
            EntryResponse,
            EntryListResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "accounts", description = "Ledger account management endpoints"),
        (name = "entries", description = "Journal entry endpoints")
    ),
    info(
        title = "restmcp Ledger API",
        version = "0.1.0",
        description = "REST API for a small in-memory ledger, also offered as MCP tools over SSE",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_ledger_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/accounts",
            "/api/accounts/search",
            "/api/accounts/{id}",
            "/api/entries",
            "/api/entries/search",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let schemas = &doc.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("CreateAccountRequest"));
        assert!(schemas.contains_key("RecordEntryRequest"));
    }
}
