//! In-memory directory
//!
//! A fixture-backed [`DirectoryEndpoint`] that answers the two account
//! filters used by the resolver. Every search it serves is recorded, which
//! makes it useful for offline runs of the CLI and for tests.

use crate::directory::DirectoryEndpoint;
use crate::filter::{account_filter, ObjectClass};
use adclaims_core::types::{DirectoryEntry, SearchScope};
use adclaims_core::{Error, Result, MEMBER_OF_ATTRIBUTE};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One fixture record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEntry {
    /// Distinguished name
    pub dn: String,

    /// `user` or `group`
    pub object_class: ObjectClass,

    /// sAMAccountName
    pub account_name: String,

    /// DNs of the groups this entry directly belongs to
    #[serde(default)]
    pub member_of: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Fixture {
    #[serde(default)]
    entries: Vec<FixtureEntry>,
}

/// A search served by the in-memory directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRecord {
    pub base_dn: String,
    pub filter: String,
    pub scope: SearchScope,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: Vec<FixtureEntry>,
    searches: Mutex<Vec<SearchRecord>>,
    failure: Option<String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FixtureEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// Load a JSON fixture of the form `{"entries": [...]}`
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse fixture: {}", e)))?;
        Ok(Self::from_entries(fixture.entries))
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_user(self, account: &str, dn: &str, member_of: &[&str]) -> Self {
        self.with_entry(FixtureEntry {
            dn: dn.to_string(),
            object_class: ObjectClass::User,
            account_name: account.to_string(),
            member_of: member_of.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_group(self, account: &str, dn: &str, member_of: &[&str]) -> Self {
        self.with_entry(FixtureEntry {
            dn: dn.to_string(),
            object_class: ObjectClass::Group,
            account_name: account.to_string(),
            member_of: member_of.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Make every search fail with a directory error
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn searches(&self) -> Vec<SearchRecord> {
        self.searches.lock().clone()
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn in_scope(dn: &str, base_dn: &str, scope: SearchScope) -> bool {
    let dn = dn.to_ascii_lowercase();
    let base = base_dn.to_ascii_lowercase();

    if base.is_empty() {
        return scope == SearchScope::Subtree;
    }

    match scope {
        SearchScope::Base => dn == base,
        SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{}", base)),
        SearchScope::OneLevel => dn
            .strip_suffix(&format!(",{}", base))
            .map(|rdn| !rdn.contains(','))
            .unwrap_or(false),
    }
}

fn to_directory_entry(entry: &FixtureEntry) -> DirectoryEntry {
    let directory_entry = DirectoryEntry::new(entry.dn.clone())
        .with_attribute("objectClass", [entry.object_class.as_str()])
        .with_attribute("sAMAccountName", [entry.account_name.as_str()]);

    if entry.member_of.is_empty() {
        directory_entry
    } else {
        directory_entry.with_attribute(
            MEMBER_OF_ATTRIBUTE,
            entry.member_of.iter().map(|dn| dn.as_bytes().to_vec()),
        )
    }
}

#[async_trait]
impl DirectoryEndpoint for InMemoryDirectory {
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<DirectoryEntry>> {
        self.searches.lock().push(SearchRecord {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
            scope,
        });

        if let Some(message) = &self.failure {
            return Err(Error::Directory(message.clone()));
        }

        // attribute values compare case-insensitively, as in AD
        let filter_key = filter.to_lowercase();
        let found: Vec<DirectoryEntry> = self
            .entries
            .iter()
            .filter(|e| account_filter(e.object_class, &e.account_name).to_lowercase() == filter_key)
            .filter(|e| in_scope(&e.dn, base_dn, scope))
            .map(to_directory_entry)
            .collect();

        debug!(filter = %filter, base_dn = %base_dn, found = found.len(), "In-memory search");
        Ok(found)
    }
}
