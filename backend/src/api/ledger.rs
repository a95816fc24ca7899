//! Ledger API handlers.
//!
//! The body-taking handlers here double as MCP tools: [`bindings`] pairs each
//! of them with its route so the capability bridge can describe and invoke it.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    Json,
};
use garde::Validate;
use restmcp_types::api::{
    AccountListResponse, AccountQuery, AccountResponse, CreateAccountRequest, EntryListResponse,
    EntryQuery, EntryResponse, ErrorResponse, RecordEntryRequest,
};
use restmcp_types::AccountId;
use tracing::info;

use crate::identity::CallerContext;
use crate::mcp::RouteBinding;
use crate::state::{AppState, LedgerError};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn ledger_error(e: LedgerError) -> ApiError {
    let status = match e {
        LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Invalid(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorResponse::new(e.to_string())))
}

fn validate<T: Validate<Context = ()>>(req: &T) -> Result<(), ApiError> {
    req.validate().map_err(|report| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Validation failed",
                report.to_string(),
            )),
        )
    })
}

/// Open a new account.
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    info!("Received create account request: name='{}'", req.name);
    validate(&req)?;

    let account = state.create_account(req, None).await.map_err(ledger_error)?;
    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

/// Search accounts by name and kind.
#[utoipa::path(
    post,
    path = "/api/accounts/search",
    tag = "accounts",
    request_body = AccountQuery,
    responses(
        (status = 200, description = "Matching accounts", body = AccountListResponse)
    )
)]
pub async fn search_accounts(
    State(state): State<AppState>,
    Json(query): Json<AccountQuery>,
) -> Json<AccountListResponse> {
    let accounts = state.search_accounts(&query).await;
    Json(AccountListResponse { accounts })
}

/// Get an account by ID.
#[utoipa::path(
    get,
    path = "/api/accounts/{id}",
    tag = "accounts",
    params(
        ("id" = String, Path, description = "Account ID (UUID)")
    ),
    responses(
        (status = 200, description = "Account found", body = AccountResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> Result<Json<AccountResponse>, ApiError> {
    match state.get_account(&id).await {
        Some(account) => Ok(Json(AccountResponse { account })),
        None => Err(ledger_error(LedgerError::AccountNotFound(id))),
    }
}

/// Post an entry against an account.
#[utoipa::path(
    post,
    path = "/api/entries",
    tag = "entries",
    request_body = RecordEntryRequest,
    responses(
        (status = 201, description = "Entry recorded", body = EntryResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
pub async fn record_entry(
    State(state): State<AppState>,
    Json(req): Json<RecordEntryRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    validate(&req)?;

    let entry = state.record_entry(req, None).await.map_err(ledger_error)?;
    Ok((StatusCode::CREATED, Json(EntryResponse { entry })))
}

/// List the entries of an account with its balance.
#[utoipa::path(
    post,
    path = "/api/entries/search",
    tag = "entries",
    request_body = EntryQuery,
    responses(
        (status = 200, description = "Entries and balance", body = EntryListResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
pub async fn search_entries(
    State(state): State<AppState>,
    Json(query): Json<EntryQuery>,
) -> Result<Json<EntryListResponse>, ApiError> {
    let (entries, balance_cents) = state
        .account_entries(&query.account_id)
        .await
        .map_err(ledger_error)?;
    Ok(Json(EntryListResponse {
        entries,
        balance_cents,
    }))
}

/// Route bindings for every ledger operation offered as an MCP tool.
///
/// Records created through a tool carry the caller's principal.
pub fn bindings(state: &AppState) -> Vec<RouteBinding> {
    let create = state.clone();
    let search = state.clone();
    let record = state.clone();
    let entries = state.clone();

    vec![
        RouteBinding::new(
            Method::POST,
            "/api/accounts",
            "AccountsApi",
            "create_account",
            move |ctx: CallerContext, req: CreateAccountRequest| {
                let state = create.clone();
                async move {
                    let account = state.create_account(req, ctx.principal).await?;
                    Ok::<_, LedgerError>(AccountResponse { account })
                }
            },
        ),
        RouteBinding::new(
            Method::POST,
            "/api/accounts/search",
            "AccountsApi",
            "search_accounts",
            move |_ctx: CallerContext, query: AccountQuery| {
                let state = search.clone();
                async move {
                    let accounts = state.search_accounts(&query).await;
                    Ok::<_, LedgerError>(AccountListResponse { accounts })
                }
            },
        ),
        RouteBinding::new(
            Method::POST,
            "/api/entries",
            "EntriesApi",
            "record_entry",
            move |ctx: CallerContext, req: RecordEntryRequest| {
                let state = record.clone();
                async move {
                    let entry = state.record_entry(req, ctx.principal).await?;
                    Ok::<_, LedgerError>(EntryResponse { entry })
                }
            },
        ),
        RouteBinding::new(
            Method::POST,
            "/api/entries/search",
            "EntriesApi",
            "search_entries",
            move |_ctx: CallerContext, query: EntryQuery| {
                let state = entries.clone();
                async move {
                    let (entries, balance_cents) = state.account_entries(&query.account_id).await?;
                    Ok::<_, LedgerError>(EntryListResponse {
                        entries,
                        balance_cents,
                    })
                }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::CapabilityBridge;
    use crate::openapi::ApiDoc;
    use serde_json::json;
    use utoipa::OpenApi;

    fn bridge(state: &AppState) -> CapabilityBridge {
        CapabilityBridge::introspect(bindings(state), &ApiDoc::openapi())
    }

    #[test]
    fn test_every_binding_becomes_a_capability() {
        let bridge = bridge(&AppState::new());
        let names: Vec<&str> = bridge.list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "AccountsApi.create_account",
                "AccountsApi.search_accounts",
                "EntriesApi.record_entry",
                "EntriesApi.search_entries",
            ]
        );
    }

    #[tokio::test]
    async fn test_capability_records_carry_principal() {
        let state = AppState::new();
        let bridge = bridge(&state);
        let ctx = CallerContext::new("tok", "alice");

        let result = bridge
            .invoke(
                &ctx,
                "AccountsApi.create_account",
                json!({"name": "Cash", "kind": "asset"}),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        let created: AccountResponse = serde_json::from_str(&result.payload).unwrap();
        assert_eq!(created.account.created_by.as_deref(), Some("alice"));

        let result = bridge
            .invoke(
                &ctx,
                "EntriesApi.record_entry",
                json!({"account_id": created.account.id, "amount_cents": 1200}),
            )
            .await
            .unwrap();
        assert!(!result.is_error);

        let (entries, balance) = state.account_entries(&created.account.id).await.unwrap();
        assert_eq!(balance, 1200);
        assert_eq!(entries[0].recorded_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_capability_business_error_is_data() {
        let bridge = bridge(&AppState::new());
        let result = bridge
            .invoke(
                &CallerContext::anonymous("tok"),
                "EntriesApi.search_entries",
                json!({"account_id": AccountId::nil()}),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.payload.starts_with("Error: Account not found"));
    }
}
