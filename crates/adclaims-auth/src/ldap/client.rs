//! LDAP directory client
//!
//! Connects and binds once with the machine account, then serves searches
//! on clones of the bound handle. Supports LDAP, LDAPS (SSL), and STARTTLS
//! connections.

use crate::directory::DirectoryEndpoint;
use adclaims_core::config::DirectoryConfig;
use adclaims_core::types::{DirectoryEntry, SearchScope};
use adclaims_core::{Error, Result, MEMBER_OF_ATTRIBUTE};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, info};

/// Bound LDAP session used as a directory endpoint
pub struct LdapDirectory {
    ldap: Ldap,
    server_url: String,
    operation_timeout: Duration,
}

impl LdapDirectory {
    /// Connect to the configured server and bind with the machine account
    pub async fn connect(config: &DirectoryConfig) -> Result<Self> {
        config.validate()?;
        let server_url = config.server_url()?;

        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.connect_timeout())
            .set_starttls(config.start_tls);

        debug!("Connecting to LDAP server: {}", server_url);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &server_url)
            .await
            .map_err(|e| Error::Directory(format!("Failed to connect to LDAP server: {}", e)))?;

        ldap3::drive!(conn);

        ldap.with_timeout(config.operation_timeout())
            .simple_bind(&config.machine_account, &config.machine_password)
            .await
            .map_err(|e| Error::Directory(format!("Service bind failed: {}", e)))?
            .success()
            .map_err(|e| Error::Directory(format!("Service bind rejected: {}", e)))?;

        info!(
            server = %server_url,
            account = %config.machine_account,
            "Bound to directory"
        );

        Ok(Self {
            ldap,
            server_url,
            operation_timeout: config.operation_timeout(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Close the session
    pub async fn unbind(mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| Error::Directory(format!("Unbind failed: {}", e)))
    }
}

#[async_trait]
impl DirectoryEndpoint for LdapDirectory {
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut ldap = self.ldap.clone();

        let (rs, _res) = ldap
            .with_timeout(self.operation_timeout)
            .search(base_dn, to_ldap_scope(scope), filter, vec![MEMBER_OF_ATTRIBUTE])
            .await
            .map_err(|e| Error::Directory(format!("Search failed: {}", e)))?
            .success()
            .map_err(|e| Error::Directory(format!("Search error: {}", e)))?;

        debug!(filter = %filter, base_dn = %base_dn, found = rs.len(), "Directory search");

        Ok(rs
            .into_iter()
            .map(|result| into_directory_entry(SearchEntry::construct(result)))
            .collect())
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Text attributes are stored as their UTF-8 bytes; binary ones as-is
fn into_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut directory_entry = DirectoryEntry::new(entry.dn);

    for (name, values) in entry.attrs {
        directory_entry = directory_entry.with_attribute(name, values);
    }
    for (name, values) in entry.bin_attrs {
        directory_entry = directory_entry.with_attribute(name, values);
    }

    directory_entry
}
