//! Ledger domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Unique identifier for an account.
pub type AccountId = Uuid;

/// Unique identifier for a journal entry.
pub type EntryId = Uuid;

/// Classification of an account in the chart of accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccountKind::Asset => "asset",
            AccountKind::Liability => "liability",
            AccountKind::Equity => "equity",
            AccountKind::Income => "income",
            AccountKind::Expense => "expense",
        };
        f.write_str(name)
    }
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Account {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    /// Principal that created the account, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: impl Into<String>, kind: AccountKind, created_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// A single journal entry posted against one account.
///
/// Amounts are signed minor units (cents); debits are positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Entry {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub id: EntryId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub account_id: AccountId,
    pub amount_cents: i64,
    #[serde(default)]
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(
        account_id: AccountId,
        amount_cents: i64,
        memo: impl Into<String>,
        recorded_by: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount_cents,
            memo: memo.into(),
            recorded_by,
            recorded_at: Utc::now(),
        }
    }
}
