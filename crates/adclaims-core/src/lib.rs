//! adclaims Core Library
//!
//! Core types, distinguished-name parsing and configuration for resolving
//! directory group memberships into role claims.

pub mod config;
pub mod dn;
pub mod error;
pub mod types;

pub use config::AdClaimsConfig;
pub use error::{Error, Result};

/// adclaims version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory attribute listing the groups an entry directly belongs to
pub const MEMBER_OF_ATTRIBUTE: &str = "memberOf";

/// Claim type used for role claims attached to a principal
pub const ROLE_CLAIM_TYPE: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";
