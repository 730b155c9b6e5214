//! The narrow contract to the external project persistence layer.
//!
//! Projects live in a relational store the engine does not own. The engine
//! reads and writes a fixed set of fields (status, resolved file path,
//! metadata snapshot) and never issues schema DDL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use clipforge_models::{ProjectId, ProjectRecord, ProjectStatus, ProjectUpdate, SourceId};

use crate::error::StoreResult;

/// Read/write access to project metadata.
#[async_trait]
pub trait ProjectMetadataStore: Send + Sync {
    /// Fetch a project record, `None` if unknown.
    async fn get(&self, project_id: ProjectId) -> StoreResult<Option<ProjectRecord>>;

    /// Apply the given field updates to a project.
    async fn update(&self, project_id: ProjectId, update: ProjectUpdate) -> StoreResult<()>;

    /// Projects whose source URL derives the given id and whose status
    /// matches. Used by the stuck-download sweeper to find owners of
    /// abandoned partials.
    async fn find_by_source(
        &self,
        source_id: &SourceId,
        status: ProjectStatus,
    ) -> StoreResult<Vec<ProjectRecord>>;
}

/// In-memory implementation, used in tests and by the CLI driver.
#[derive(Default)]
pub struct MemoryProjectStore {
    records: Mutex<HashMap<ProjectId, ProjectRecord>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project record.
    pub async fn insert(&self, record: ProjectRecord) {
        self.records.lock().await.insert(record.id, record);
    }

    /// Convenience: an `Arc`'d empty store.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ProjectMetadataStore for MemoryProjectStore {
    async fn get(&self, project_id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        Ok(self.records.lock().await.get(&project_id).cloned())
    }

    async fn update(&self, project_id: ProjectId, update: ProjectUpdate) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&project_id) {
            if let Some(status) = update.status {
                record.status = status;
            }
            if let Some(path) = update.video_file_path {
                record.video_file_path = Some(path);
            }
            if let Some(details) = update.details {
                record.details = details;
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_by_source(
        &self,
        source_id: &SourceId,
        status: ProjectStatus,
    ) -> StoreResult<Vec<ProjectRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.status == status && &SourceId::from_url(&r.source_url) == source_id)
            .cloned()
            .collect())
    }
}
