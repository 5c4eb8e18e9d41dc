//! Directory entry types

use std::collections::HashMap;

/// Search scope for a directory query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// The base entry only
    Base,
    /// Immediate children of the base
    OneLevel,
    /// The base and everything below it
    #[default]
    Subtree,
}

/// One directory record returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,

    /// Multi-valued attributes, values as raw bytes
    pub attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attributes
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Values of an attribute; names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[Vec<u8>] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Values of an attribute decoded as UTF-8 text
    pub fn text_values(&self, name: &str) -> Vec<String> {
        self.values(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect()
    }

    /// DNs of the groups this entry directly belongs to (empty when absent)
    pub fn member_of(&self) -> Vec<String> {
        self.text_values(crate::MEMBER_OF_ATTRIBUTE)
    }
}
