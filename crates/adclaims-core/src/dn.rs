//! Distinguished name and account name helpers
//!
//! Pure string transforms used before and during group resolution:
//! - leading common name of a DN (`CN=TestGroup,DC=KERB,DC=local` -> `TestGroup`)
//! - search base derived from an account's domain (`kerb.local` -> `dc=kerb,dc=local`)
//! - account and domain halves of a `user@domain` name

use crate::error::{Error, Result};
use thiserror::Error;

const CN_PREFIX: &str = "CN=";

/// Common-name parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnError {
    #[error("'{0}' does not start with a CN= component")]
    MissingCommonName(String),

    #[error("'{0}' has an empty CN= component")]
    EmptyCommonName(String),
}

/// Extract the value of the leading `CN=` component of a distinguished name.
///
/// The value runs up to, not including, the first comma. The prefix is
/// matched case-insensitively.
pub fn common_name(distinguished_name: &str) -> std::result::Result<&str, DnError> {
    let has_prefix = distinguished_name
        .get(..CN_PREFIX.len())
        .map(|p| p.eq_ignore_ascii_case(CN_PREFIX))
        .unwrap_or(false);

    if !has_prefix {
        return Err(DnError::MissingCommonName(distinguished_name.to_string()));
    }

    let rest = &distinguished_name[CN_PREFIX.len()..];
    let value = match rest.find(',') {
        Some(end) => &rest[..end],
        None => rest,
    };

    if value.is_empty() {
        return Err(DnError::EmptyCommonName(distinguished_name.to_string()));
    }

    Ok(value)
}

/// Split a `name@domain` string into its two halves.
///
/// Exactly one `@` with non-empty text on both sides is required.
pub fn split_account(account: &str) -> Result<(&str, &str)> {
    let mut parts = account.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(domain), None) if !name.is_empty() && !domain.is_empty() => {
            Ok((name, domain))
        }
        _ => Err(Error::InvalidAccountName(format!(
            "'{}' must have the form name@domain",
            account
        ))),
    }
}

/// Account name portion (before `@`) of a principal name
pub fn account_name(principal_name: &str) -> Result<&str> {
    split_account(principal_name).map(|(name, _)| name)
}

/// Domain portion (after `@`) of a machine account
pub fn domain_of(machine_account: &str) -> Result<&str> {
    split_account(machine_account).map(|(_, domain)| domain)
}

/// Build the search base DN from a dotted domain.
///
/// Each label becomes a `dc=<label>` component; label case is preserved.
pub fn search_base_dn(domain: &str) -> Result<String> {
    if domain.split('.').any(|label| label.is_empty()) {
        return Err(Error::InvalidAccountName(format!(
            "domain '{}' contains an empty label",
            domain
        )));
    }

    Ok(domain
        .split('.')
        .map(|label| format!("dc={}", label))
        .collect::<Vec<_>>()
        .join(","))
}

/// Search base DN for a machine account (`svc@KERB.LOCAL` -> `dc=KERB,dc=LOCAL`)
pub fn search_base_for_account(machine_account: &str) -> Result<String> {
    search_base_dn(domain_of(machine_account)?)
}
