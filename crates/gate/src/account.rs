// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account context resolution from the provider's userinfo account list.

use crate::oauth::ProviderAccount;

/// Fixed suffix appended to an account's base URI to form the API root.
pub const REST_SUFFIX: &str = "/restapi";

/// The account a session operates in, with the derived API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: String,
    pub account_name: String,
    pub base_path: String,
}

impl AccountContext {
    fn from_account(account: &ProviderAccount) -> Self {
        Self {
            account_id: account.account_id.clone(),
            account_name: account.account_name.clone(),
            base_path: format!("{}{}", account.base_uri.trim_end_matches('/'), REST_SUFFIX),
        }
    }
}

/// Pick the working account from the provider's list.
///
/// A requested id wins when present. Requested-but-absent falls back to
/// the provider's default entry with a log line rather than failing the
/// login. With no default marked, the first entry wins. Returns `None`
/// only for an empty list.
pub fn resolve_account(
    accounts: &[ProviderAccount],
    target_account_id: Option<&str>,
) -> Option<AccountContext> {
    if let Some(requested) = target_account_id {
        if let Some(found) = accounts.iter().find(|a| a.account_id == requested) {
            return Some(AccountContext::from_account(found));
        }
        tracing::warn!(
            account_id = requested,
            "requested account missing from userinfo, falling back to default"
        );
    }
    let fallback = accounts
        .iter()
        .find(|a| a.is_default)
        .or_else(|| accounts.first())?;
    Some(AccountContext::from_account(fallback))
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
