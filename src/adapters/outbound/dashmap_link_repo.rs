//! DashMap Link Repository
//!
//! Implements LinkRepository in memory using DashMap.

use crate::domain::entities::{AccessTrace, Link, TracePatch};
use crate::domain::ports::{LinkRepository, StoreError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// A link together with its visits. Stored under one map entry so every
/// mutation of a link holds that entry's shard lock.
#[derive(Debug, Clone)]
struct LinkRecord {
    link: Link,
    traces: Vec<AccessTrace>,
}

/// In-memory link repository.
///
/// Appends and updates on the same link are serialized by the DashMap
/// entry lock; different links never contend on the same entry. Data is
/// lost when the process exits.
pub struct DashMapLinkRepository {
    links: Arc<DashMap<String, LinkRecord>>,
}

impl DashMapLinkRepository {
    /// Create a new repository.
    pub fn new() -> Self {
        Self {
            links: Arc::new(DashMap::new()),
        }
    }
}

impl Default for DashMapLinkRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkRepository for DashMapLinkRepository {
    async fn get(&self, link_id: &str) -> Result<Option<Link>, StoreError> {
        Ok(self.links.get(link_id).map(|e| e.link.clone()))
    }

    async fn put(&self, link: Link) -> Result<(), StoreError> {
        match self.links.entry(link.id.clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().link = link,
            Entry::Vacant(entry) => {
                entry.insert(LinkRecord {
                    link,
                    traces: Vec::new(),
                });
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Link>, StoreError> {
        let mut links: Vec<Link> = self.links.iter().map(|e| e.link.clone()).collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn append_trace(&self, link_id: &str, trace: AccessTrace) -> Result<(), StoreError> {
        let mut record = self
            .links
            .get_mut(link_id)
            .ok_or_else(|| StoreError::LinkNotFound(link_id.to_string()))?;
        record.traces.push(trace);
        Ok(())
    }

    async fn update_trace(
        &self,
        link_id: &str,
        access_id: &str,
        patch: TracePatch,
    ) -> Result<bool, StoreError> {
        let mut record = self
            .links
            .get_mut(link_id)
            .ok_or_else(|| StoreError::LinkNotFound(link_id.to_string()))?;

        match record.traces.iter_mut().find(|t| t.access_id == access_id) {
            Some(trace) => {
                trace.apply(&patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn traces(&self, link_id: &str) -> Result<Vec<AccessTrace>, StoreError> {
        self.links
            .get(link_id)
            .map(|e| e.traces.clone())
            .ok_or_else(|| StoreError::LinkNotFound(link_id.to_string()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.links.len())
    }
}
