//! Link Repository Port
//!
//! Defines the interface for persisting links and their access traces.
//! Implementations may use SQLite or in-memory storage.

use crate::domain::entities::{AccessTrace, Link, TracePatch};
use async_trait::async_trait;

/// Storage failures surfaced to the application layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("link not found: {0}")]
    LinkNotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Repository for links and the visits recorded against them.
///
/// Each call is atomic with respect to the link it touches. Nothing spans
/// calls: a caller that reads, decides and then writes can race with other
/// writers.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Get a link by ID.
    async fn get(&self, link_id: &str) -> Result<Option<Link>, StoreError>;

    /// Create or replace a link. A new link starts with no traces; replacing
    /// an existing link keeps its traces.
    async fn put(&self, link: Link) -> Result<(), StoreError>;

    /// All links, oldest first.
    async fn list(&self) -> Result<Vec<Link>, StoreError>;

    /// Record a visit. Fails with `LinkNotFound` for unknown links.
    async fn append_trace(&self, link_id: &str, trace: AccessTrace) -> Result<(), StoreError>;

    /// Patch one trace identified by its access ID.
    ///
    /// Returns `Ok(false)` when the link exists but no trace has that access
    /// ID. Applying the same patch twice leaves the same trace.
    async fn update_trace(
        &self,
        link_id: &str,
        access_id: &str,
        patch: TracePatch,
    ) -> Result<bool, StoreError>;

    /// Traces of a link in recording order.
    async fn traces(&self, link_id: &str) -> Result<Vec<AccessTrace>, StoreError>;

    /// Number of stored links.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list().await?.len())
    }
}
