//! Application state management.
//!
//! An in-memory ledger of accounts and the signed entries posted against
//! them. Its REST handlers are what the MCP bridge exposes as tools.

use restmcp_types::api::{AccountQuery, CreateAccountRequest, RecordEntryRequest};
use restmcp_types::{Account, AccountId, Entry, EntryId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Ledger operation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Sum of `amounts`, or `None` when it leaves the `i64` range.
fn checked_balance(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |total, amount| total.checked_add(amount))
}

fn balance_out_of_range() -> LedgerError {
    LedgerError::Invalid("balance out of range".into())
}

/// Shared application state.
#[derive(Clone, Default)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Default)]
struct AppStateInner {
    /// All accounts, indexed by ID
    accounts: RwLock<HashMap<AccountId, Account>>,
    /// All entries, indexed by ID
    entries: RwLock<HashMap<EntryId, Entry>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account on behalf of `actor`.
    pub async fn create_account(
        &self,
        req: CreateAccountRequest,
        actor: Option<String>,
    ) -> Result<Account, LedgerError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(LedgerError::Invalid("account name must not be empty".into()));
        }

        let account = Account::new(name, req.kind, actor);
        info!(
            "Creating account: {} ({}, {})",
            account.name, account.id, account.kind
        );
        self.inner
            .accounts
            .write()
            .await
            .insert(account.id, account.clone());
        Ok(account)
    }

    pub async fn get_account(&self, id: &AccountId) -> Option<Account> {
        self.inner.accounts.read().await.get(id).cloned()
    }

    /// Accounts matching `query`, oldest first.
    pub async fn search_accounts(&self, query: &AccountQuery) -> Vec<Account> {
        let needle = query.name_contains.as_deref().map(str::to_lowercase);
        let accounts = self.inner.accounts.read().await;
        let mut matches: Vec<Account> = accounts
            .values()
            .filter(|a| query.kind.is_none_or(|k| a.kind == k))
            .filter(|a| {
                needle
                    .as_deref()
                    .is_none_or(|n| a.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        debug!("Account search matched {} of {}", matches.len(), accounts.len());
        matches
    }

    /// Post an entry against an existing account on behalf of `actor`.
    ///
    /// An entry that would take the account balance outside the `i64` range
    /// is rejected.
    pub async fn record_entry(
        &self,
        req: RecordEntryRequest,
        actor: Option<String>,
    ) -> Result<Entry, LedgerError> {
        if req.amount_cents == 0 {
            return Err(LedgerError::Invalid("amount must not be zero".into()));
        }
        if self.get_account(&req.account_id).await.is_none() {
            return Err(LedgerError::AccountNotFound(req.account_id));
        }

        let mut entries = self.inner.entries.write().await;
        let current = entries
            .values()
            .filter(|e| e.account_id == req.account_id)
            .map(|e| e.amount_cents);
        checked_balance(current.chain([req.amount_cents])).ok_or_else(balance_out_of_range)?;

        let entry = Entry::new(req.account_id, req.amount_cents, req.memo, actor);
        info!(
            "Recording entry {} on account {}: {}",
            entry.id, entry.account_id, entry.amount_cents
        );
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Entries of one account, oldest first, with their sum.
    pub async fn account_entries(
        &self,
        account_id: &AccountId,
    ) -> Result<(Vec<Entry>, i64), LedgerError> {
        if self.get_account(account_id).await.is_none() {
            return Err(LedgerError::AccountNotFound(*account_id));
        }

        let entries = self.inner.entries.read().await;
        let mut matches: Vec<Entry> = entries
            .values()
            .filter(|e| e.account_id == *account_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        let balance = checked_balance(matches.iter().map(|e| e.amount_cents))
            .ok_or_else(balance_out_of_range)?;
        Ok((matches, balance))
    }
}
