//! Batch record persistence
//!
//! The orchestrator writes the batch record at every phase boundary, so a crash leaves
//! the last known status visible. Records that reached a terminal status are never
//! overwritten.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;
use vidcap_core::models::{BatchStateError, UploadBatch};
use vidcap_storage::keys::batch_record_key;
use vidcap_storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Batch {0} not found")]
    NotFound(Uuid),

    #[error("Batch {0} already exists")]
    AlreadyExists(Uuid),

    #[error(transparent)]
    Terminal(#[from] BatchStateError),

    #[error("Batch record storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Batch record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Persist a new batch. Fails if a record with the same id exists.
    async fn insert(&self, batch: &UploadBatch) -> Result<(), RepositoryError>;

    /// Replace an existing record. Fails if the stored record is already terminal.
    async fn update(&self, batch: &UploadBatch) -> Result<(), RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadBatch>, RepositoryError>;

    /// Remove a record. Removing a missing record succeeds.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

fn ensure_mutable(stored: &UploadBatch) -> Result<(), RepositoryError> {
    if stored.status.is_terminal() {
        return Err(BatchStateError::Terminal {
            id: stored.id,
            status: stored.status,
        }
        .into());
    }
    Ok(())
}

/// Process-local repository. Records are lost when the process exits.
#[derive(Default)]
pub struct InMemoryBatchRepository {
    batches: RwLock<HashMap<Uuid, UploadBatch>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn insert(&self, batch: &UploadBatch) -> Result<(), RepositoryError> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.id) {
            return Err(RepositoryError::AlreadyExists(batch.id));
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn update(&self, batch: &UploadBatch) -> Result<(), RepositoryError> {
        let mut batches = self.batches.write().await;
        let stored = batches
            .get_mut(&batch.id)
            .ok_or(RepositoryError::NotFound(batch.id))?;
        ensure_mutable(stored)?;
        *stored = batch.clone();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadBatch>, RepositoryError> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.batches.write().await.remove(&id);
        Ok(())
    }
}

/// Stores each record as JSON at `{prefix}/{batch_id}/batch.json` in the blob store.
pub struct StorageBatchRepository {
    storage: Arc<dyn Storage>,
    prefix: String,
}

impl StorageBatchRepository {
    pub fn new(storage: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    async fn write(&self, batch: &UploadBatch) -> Result<(), RepositoryError> {
        let key = batch_record_key(&self.prefix, batch.id);
        let body = serde_json::to_vec_pretty(batch)?;
        self.storage.upload(&key, body, "application/json").await?;
        tracing::debug!(batch_id = %batch.id, status = %batch.status, key = %key, "Batch record written");
        Ok(())
    }
}

#[async_trait]
impl BatchRepository for StorageBatchRepository {
    async fn insert(&self, batch: &UploadBatch) -> Result<(), RepositoryError> {
        if self
            .storage
            .exists(&batch_record_key(&self.prefix, batch.id))
            .await?
        {
            return Err(RepositoryError::AlreadyExists(batch.id));
        }
        self.write(batch).await
    }

    async fn update(&self, batch: &UploadBatch) -> Result<(), RepositoryError> {
        let stored = self
            .get(batch.id)
            .await?
            .ok_or(RepositoryError::NotFound(batch.id))?;
        ensure_mutable(&stored)?;
        self.write(batch).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadBatch>, RepositoryError> {
        match self.storage.download(&batch_record_key(&self.prefix, id)).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.storage
            .delete(&batch_record_key(&self.prefix, id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidcap_core::models::{BatchMetadata, BatchStatus};
    use vidcap_storage::LocalStorage;

    fn batch() -> UploadBatch {
        let id = Uuid::new_v4();
        UploadBatch::new(
            id,
            BatchMetadata::default(),
            1,
            format!("uploads/{}", id),
            Vec::new(),
        )
    }

    async fn exercise(repo: &dyn BatchRepository) {
        let mut batch = batch();
        assert!(repo.get(batch.id).await.unwrap().is_none());

        repo.insert(&batch).await.unwrap();
        assert!(matches!(
            repo.insert(&batch).await,
            Err(RepositoryError::AlreadyExists(_))
        ));

        batch.transition(BatchStatus::Ready).unwrap();
        repo.update(&batch).await.unwrap();
        assert_eq!(
            repo.get(batch.id).await.unwrap().unwrap().status,
            BatchStatus::Ready
        );

        // A terminal record is frozen even if the caller holds a stale copy.
        let mut stale = batch.clone();
        stale.status = BatchStatus::Failed;
        assert!(matches!(
            repo.update(&stale).await,
            Err(RepositoryError::Terminal(_))
        ));

        repo.delete(batch.id).await.unwrap();
        assert!(repo.get(batch.id).await.unwrap().is_none());
        repo.delete(batch.id).await.unwrap();

        assert!(matches!(
            repo.update(&batch).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_repository_lifecycle() {
        exercise(&InMemoryBatchRepository::new()).await;
    }

    #[tokio::test]
    async fn storage_repository_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000/media".to_string())
            .await
            .unwrap();
        exercise(&StorageBatchRepository::new(Arc::new(storage), "uploads")).await;
    }

    #[tokio::test]
    async fn storage_repository_writes_record_under_batch_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost:3000/media".to_string())
                .await
                .unwrap(),
        );
        let repo = StorageBatchRepository::new(storage.clone(), "uploads");
        let batch = batch();
        repo.insert(&batch).await.unwrap();

        let keys = storage
            .list(&format!("uploads/{}", batch.id))
            .await
            .unwrap();
        assert_eq!(keys, vec![format!("uploads/{}/batch.json", batch.id)]);
    }
}
