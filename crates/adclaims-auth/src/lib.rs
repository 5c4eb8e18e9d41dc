//! Directory-backed role claims for authenticated principals
//!
//! After an authentication handshake succeeds, [`RoleAdapter`] looks the
//! user up in an LDAP-compatible directory, walks its group memberships
//! (optionally through nested groups) and attaches one role claim per group.

pub mod directory;
pub mod filter;
pub mod hook;
pub mod ldap;
pub mod memory;
pub mod metrics;
pub mod resolver;

pub use directory::DirectoryEndpoint;
pub use filter::{account_filter, group_filter, user_filter, ObjectClass};
pub use hook::{on_authenticated, AdapterOptions, ResolutionReport, RoleAdapter};
pub use ldap::LdapDirectory;
pub use memory::{FixtureEntry, InMemoryDirectory, SearchRecord};
pub use resolver::{GroupResolver, Resolution, ResolverLimits};
