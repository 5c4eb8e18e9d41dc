//! Directory endpoint abstraction
//!
//! The resolver only needs filter-based search. Connection setup, binding
//! and transport security belong to the implementation.

use adclaims_core::types::{DirectoryEntry, SearchScope};
use adclaims_core::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A connected, authenticated directory session
#[async_trait]
pub trait DirectoryEndpoint: Send + Sync {
    /// Run a search and return every matching entry in server order
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<DirectoryEntry>>;
}

#[async_trait]
impl<T: DirectoryEndpoint + ?Sized> DirectoryEndpoint for Arc<T> {
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<DirectoryEntry>> {
        (**self).search(base_dn, filter, scope).await
    }
}

#[async_trait]
impl<T: DirectoryEndpoint + ?Sized> DirectoryEndpoint for Box<T> {
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<DirectoryEntry>> {
        (**self).search(base_dn, filter, scope).await
    }
}
