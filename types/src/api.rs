//! API request and response types.

use crate::ledger::{Account, AccountId, AccountKind, Entry};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

// ============================================================================
// Account API Types
// ============================================================================

/// Request to open a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(garde::Validate))]
pub struct CreateAccountRequest {
    /// Display name of the account.
    #[cfg_attr(feature = "validation", garde(length(min = 1, max = 128)))]
    pub name: String,
    /// Account classification. Defaults to `asset`.
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub kind: AccountKind,
}

/// Filter for searching accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(garde::Validate))]
pub struct AccountQuery {
    /// Case-insensitive substring of the account name.
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub name_contains: Option<String>,
    /// Only return accounts of this kind.
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub kind: Option<AccountKind>,
}

/// Response containing a single account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AccountResponse {
    pub account: Account,
}

/// Response containing a list of accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AccountListResponse {
    pub accounts: Vec<Account>,
}

// ============================================================================
// Entry API Types
// ============================================================================

/// Request to post a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(garde::Validate))]
pub struct RecordEntryRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub account_id: AccountId,
    /// Signed amount in minor units. Must not be zero.
    #[cfg_attr(feature = "validation", garde(custom(non_zero_amount)))]
    pub amount_cents: i64,
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(length(max = 512)))]
    pub memo: String,
}

#[cfg(feature = "validation")]
fn non_zero_amount(value: &i64, _ctx: &()) -> garde::Result {
    if *value == 0 {
        return Err(garde::Error::new("amount must not be zero"));
    }
    Ok(())
}

/// Filter for listing the entries of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(garde::Validate))]
pub struct EntryQuery {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub account_id: AccountId,
}

/// Response containing a single entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EntryResponse {
    pub entry: Entry,
}

/// Entries of one account with the running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EntryListResponse {
    pub entries: Vec<Entry>,
    pub balance_cents: i64,
}

// ============================================================================
// Error Response
// ============================================================================

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account_kind_defaults_to_asset() {
        let req: CreateAccountRequest = serde_json::from_str(r#"{"name":"Cash"}"#).unwrap();
        assert_eq!(req.kind, AccountKind::Asset);
    }

    #[test]
    fn test_error_response_skips_empty_details() {
        let json = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "boom" }));
    }
}
