//! LDAP/Active Directory directory endpoint
//!
//! Provides a [`DirectoryEndpoint`](crate::DirectoryEndpoint) over a bound
//! LDAP session:
//! - LDAP and LDAPS URLs
//! - STARTTLS upgrade
//! - Service account (machine account) simple bind
//! - Per-operation timeouts

mod client;

pub use client::LdapDirectory;
