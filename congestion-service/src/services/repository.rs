use crate::models::{CongestionLevel, CongestionRecord};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, bson::oid::ObjectId, options::UpdateOptions, Collection};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::MongoDb;

/// Result of writing a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// A record existed and already held the requested level.
    Unchanged,
}

/// Data access for stored congestion levels.
#[async_trait]
pub trait CongestionRepository: Send + Sync {
    /// Records whose `chargerId` is in `charger_ids`, in store order.
    async fn find_by_charger_ids(
        &self,
        charger_ids: &[ObjectId],
    ) -> Result<Vec<CongestionRecord>, AppError>;

    async fn upsert_level(
        &self,
        charger_id: ObjectId,
        level: CongestionLevel,
    ) -> Result<UpsertOutcome, AppError>;

    /// Removes every record for the charger and returns how many were deleted.
    async fn delete_level(&self, charger_id: ObjectId) -> Result<u64, AppError>;

    /// Applies the entries in order; a later entry for the same charger wins.
    async fn upsert_levels(
        &self,
        entries: &[(ObjectId, CongestionLevel)],
    ) -> Result<u64, AppError> {
        let mut applied = 0;
        for (charger_id, level) in entries {
            self.upsert_level(*charger_id, *level).await?;
            applied += 1;
        }
        Ok(applied)
    }
}

#[derive(Clone)]
pub struct MongoCongestionRepository {
    collection: Collection<CongestionRecord>,
}

impl MongoCongestionRepository {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            collection: db.congestions(),
        }
    }
}

#[async_trait]
impl CongestionRepository for MongoCongestionRepository {
    async fn find_by_charger_ids(
        &self,
        charger_ids: &[ObjectId],
    ) -> Result<Vec<CongestionRecord>, AppError> {
        let filter = doc! { "chargerId": { "$in": charger_ids.to_vec() } };

        let cursor = self.collection.find(filter, None).await.map_err(|e| {
            tracing::error!("Failed to query congestion levels: {}", e);
            AppError::from(e)
        })?;

        cursor.try_collect().await.map_err(|e| {
            tracing::error!("Failed to collect congestion levels: {}", e);
            AppError::from(e)
        })
    }

    async fn upsert_level(
        &self,
        charger_id: ObjectId,
        level: CongestionLevel,
    ) -> Result<UpsertOutcome, AppError> {
        let options = UpdateOptions::builder().upsert(true).build();

        // Every document for the charger is written so that duplicates left
        // behind by a non-unique index never disagree.
        let result = self
            .collection
            .update_many(
                doc! { "chargerId": charger_id },
                doc! { "$set": { "congestion_level": level.as_str() } },
                options,
            )
            .await
            .map_err(|e| {
                tracing::error!(charger_id = %charger_id, "Failed to upsert congestion level: {}", e);
                AppError::from(e)
            })?;

        // A same-value write matches without modifying; that is still a success.
        let outcome = if result.upserted_id.is_some() {
            UpsertOutcome::Inserted
        } else if result.modified_count > 0 {
            UpsertOutcome::Updated
        } else if result.matched_count > 0 {
            UpsertOutcome::Unchanged
        } else {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Upsert for charger {} neither matched nor inserted a document",
                charger_id
            )));
        };

        Ok(outcome)
    }

    async fn delete_level(&self, charger_id: ObjectId) -> Result<u64, AppError> {
        let result = self
            .collection
            .delete_many(doc! { "chargerId": charger_id }, None)
            .await
            .map_err(|e| {
                tracing::error!(charger_id = %charger_id, "Failed to delete congestion level: {}", e);
                AppError::from(e)
            })?;

        Ok(result.deleted_count)
    }
}

/// Process-local repository keyed by charger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCongestionRepository {
    records: Arc<RwLock<HashMap<ObjectId, CongestionRecord>>>,
}

impl InMemoryCongestionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_error() -> AppError {
        AppError::DatabaseError(anyhow::anyhow!("In-memory congestion store lock poisoned"))
    }
}

#[async_trait]
impl CongestionRepository for InMemoryCongestionRepository {
    async fn find_by_charger_ids(
        &self,
        charger_ids: &[ObjectId],
    ) -> Result<Vec<CongestionRecord>, AppError> {
        let records = self.records.read().map_err(|_| Self::lock_error())?;
        Ok(charger_ids
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    async fn upsert_level(
        &self,
        charger_id: ObjectId,
        level: CongestionLevel,
    ) -> Result<UpsertOutcome, AppError> {
        let mut records = self.records.write().map_err(|_| Self::lock_error())?;
        match records.get_mut(&charger_id) {
            Some(record) if record.congestion_level == level => Ok(UpsertOutcome::Unchanged),
            Some(record) => {
                record.congestion_level = level;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let mut record = CongestionRecord::new(charger_id, level);
                record.id = Some(ObjectId::new());
                records.insert(charger_id, record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn delete_level(&self, charger_id: ObjectId) -> Result<u64, AppError> {
        let mut records = self.records.write().map_err(|_| Self::lock_error())?;
        Ok(records.remove(&charger_id).map_or(0, |_| 1))
    }
}
