//! Business rules for reading and writing congestion levels.
//!
//! Stored records only exist for chargers that were explicitly rated. Reads
//! reconcile the requested charger list against what the store returned and
//! fill the gaps with `unknown`, so callers always get one entry per charger.

use crate::models::{CongestionLevel, CongestionRecord};
use crate::services::metrics::{record_level_write, record_unknown_levels};
use crate::services::repository::{CongestionRepository, UpsertOutcome};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const INVALID_LEVEL_MESSAGE: &str = "Level must be 'low', 'medium', or 'high'";

/// One `(station_id, congestion_level)` pair from a batch upload, still unparsed.
/// `None` means the field was missing or not a string.
#[derive(Debug, Clone, Default)]
pub struct BatchEntry {
    pub station_id: Option<String>,
    pub congestion_level: Option<String>,
}

#[derive(Clone)]
pub struct CongestionService {
    repository: Arc<dyn CongestionRepository>,
    max_batch_size: usize,
}

impl CongestionService {
    pub fn new(repository: Arc<dyn CongestionRepository>, max_batch_size: usize) -> Self {
        Self {
            repository,
            max_batch_size,
        }
    }

    /// Levels for every distinct requested charger, in request order.
    pub async fn get_levels(&self, charger_ids: &[String]) -> Result<Vec<CongestionRecord>, AppError> {
        if charger_ids.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Array must contain at least one station ID"
            )));
        }

        let mut seen = HashSet::with_capacity(charger_ids.len());
        let mut requested = Vec::with_capacity(charger_ids.len());
        for raw in charger_ids {
            let id = parse_charger_id(raw)?;
            if seen.insert(id) {
                requested.push(id);
            }
        }

        let found = self
            .repository
            .find_by_charger_ids(&requested)
            .await
            .map_err(|e| e.with_context("Error retrieving congestion levels"))?;

        // First stored record per charger is authoritative; anything not asked for is dropped.
        let mut by_charger: HashMap<ObjectId, CongestionRecord> = HashMap::with_capacity(found.len());
        for record in found {
            if seen.contains(&record.charger_id) {
                by_charger.entry(record.charger_id).or_insert(record);
            }
        }

        let mut unknown = 0;
        let levels = requested
            .into_iter()
            .map(|id| {
                by_charger.remove(&id).unwrap_or_else(|| {
                    unknown += 1;
                    CongestionRecord::unknown(id)
                })
            })
            .collect::<Vec<_>>();

        if unknown > 0 {
            record_unknown_levels(unknown);
        }
        tracing::debug!(
            requested = levels.len(),
            unknown = unknown,
            "Resolved congestion levels"
        );

        Ok(levels)
    }

    pub async fn set_level(&self, charger_id: &str, level: &str) -> Result<UpsertOutcome, AppError> {
        let id = parse_charger_id(charger_id)?;
        let level = CongestionLevel::parse_assignable(level)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(INVALID_LEVEL_MESSAGE)))?;

        let outcome = self
            .repository
            .upsert_level(id, level)
            .await
            .map_err(|e| e.with_context("Error updating congestion levels"))?;

        record_level_write("put", 1);
        tracing::info!(charger_id = %id, level = %level, outcome = ?outcome, "Congestion level stored");
        Ok(outcome)
    }

    pub async fn delete_level(&self, charger_id: &str) -> Result<(), AppError> {
        let id = parse_charger_id(charger_id)?;

        let deleted = self
            .repository
            .delete_level(id)
            .await
            .map_err(|e| e.with_context("Error deleting congestion level"))?;

        if deleted == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "No congestion level stored for charger {}",
                charger_id
            )));
        }

        record_level_write("delete", deleted);
        tracing::info!(charger_id = %id, deleted = deleted, "Congestion level deleted");
        Ok(())
    }

    /// Validates every entry, then writes them in order. Nothing is written
    /// if any entry is malformed.
    pub async fn set_levels_batch(&self, entries: Vec<BatchEntry>) -> Result<u64, AppError> {
        if entries.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one prediction must be provided"
            )));
        }

        if entries.len() > self.max_batch_size {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Maximum {} predictions per batch",
                self.max_batch_size
            )));
        }

        let mut parsed = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let raw_id = entry.station_id.as_deref().ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("ID must be a string for {}", index))
            })?;
            let id = ObjectId::parse_str(raw_id).map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!(
                    "ID must be a valid charger ID for {}",
                    index
                ))
            })?;
            let level = entry
                .congestion_level
                .as_deref()
                .and_then(CongestionLevel::parse_assignable)
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("{} for {}", INVALID_LEVEL_MESSAGE, index))
                })?;
            parsed.push((id, level));
        }

        let applied = self
            .repository
            .upsert_levels(&parsed)
            .await
            .map_err(|e| e.with_context("Error updating congestion levels"))?;

        record_level_write("batch", applied);
        tracing::info!(applied = applied, "Congestion level batch stored");
        Ok(applied)
    }
}

fn parse_charger_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid charger ID: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::repository::InMemoryCongestionRepository;

    const A: &str = "674f98013dc8e5d2ac00894a";
    const B: &str = "674f97ff3dc8e5d2ac008456";
    const C: &str = "674f97ff3dc8e5d2ac008407";

    fn service() -> (CongestionService, InMemoryCongestionRepository) {
        let repo = InMemoryCongestionRepository::new();
        (CongestionService::new(Arc::new(repo.clone()), 100), repo)
    }

    fn entry(id: &str, level: &str) -> BatchEntry {
        BatchEntry {
            station_id: Some(id.to_string()),
            congestion_level: Some(level.to_string()),
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_records_are_reported_unknown_in_request_order() {
        let (service, _) = service();
        service.set_level(B, "high").await.unwrap();

        let levels = service.get_levels(&ids(&[A, B, C])).await.unwrap();

        let charger_ids: Vec<String> = levels.iter().map(|r| r.charger_id.to_hex()).collect();
        assert_eq!(charger_ids, ids(&[A, B, C]));
        assert_eq!(levels[0].congestion_level, CongestionLevel::Unknown);
        assert!(levels[0].id.is_none());
        assert_eq!(levels[1].congestion_level, CongestionLevel::High);
        assert!(levels[1].id.is_some());
        assert_eq!(levels[2].congestion_level, CongestionLevel::Unknown);
    }

    #[tokio::test]
    async fn duplicate_ids_yield_one_entry() {
        let (service, _) = service();
        let levels = service.get_levels(&ids(&[A, A, B, A])).await.unwrap();
        assert_eq!(levels.len(), 2);
    }

    #[tokio::test]
    async fn get_rejects_empty_and_malformed_ids() {
        let (service, _) = service();

        let err = service.get_levels(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service.get_levels(&ids(&[A, "not-an-id"])).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let (service, repo) = service();

        assert_eq!(
            service.set_level(A, "medium").await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            service.set_level(A, "medium").await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn unknown_level_cannot_be_written() {
        let (service, repo) = service();

        let err = service.set_level(A, "unknown").await.unwrap_err();
        assert_eq!(err.to_string(), format!("Bad request: {}", INVALID_LEVEL_MESSAGE));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn delete_then_get_returns_unknown() {
        let (service, _) = service();
        service.set_level(A, "low").await.unwrap();

        service.delete_level(A).await.unwrap();

        let levels = service.get_levels(&ids(&[A])).await.unwrap();
        assert_eq!(levels[0].congestion_level, CongestionLevel::Unknown);
    }

    #[tokio::test]
    async fn deleting_missing_level_is_not_found() {
        let (service, _) = service();
        let err = service.delete_level(A).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_rejects_malformed_entry_at_any_index() {
        let (service, repo) = service();

        let err = service
            .set_levels_batch(vec![entry(A, "low"), entry(B, "medium"), entry(C, "extreme")])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: Level must be 'low', 'medium', or 'high' for 2"
        );

        let err = service
            .set_levels_batch(vec![entry(A, "low"), entry("bogus", "high")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad request: ID must be a valid charger ID for 1");

        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn batch_writes_all_entries() {
        let (service, _) = service();

        let applied = service
            .set_levels_batch(vec![entry(A, "low"), entry(B, "medium"), entry(C, "high")])
            .await
            .unwrap();
        assert_eq!(applied, 3);

        let levels = service.get_levels(&ids(&[A, B, C])).await.unwrap();
        let stored: Vec<CongestionLevel> = levels.iter().map(|r| r.congestion_level).collect();
        assert_eq!(
            stored,
            vec![
                CongestionLevel::Low,
                CongestionLevel::Medium,
                CongestionLevel::High
            ]
        );
    }

    #[tokio::test]
    async fn batch_size_is_bounded() {
        let repo = InMemoryCongestionRepository::new();
        let service = CongestionService::new(Arc::new(repo), 1);

        let err = service
            .set_levels_batch(vec![entry(A, "low"), entry(B, "low")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service.set_levels_batch(vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn batch_reports_missing_fields_with_index() {
        let (service, repo) = service();

        let missing_id = BatchEntry {
            station_id: None,
            congestion_level: Some("low".to_string()),
        };
        let err = service
            .set_levels_batch(vec![entry(A, "low"), missing_id])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad request: ID must be a string for 1");

        let missing_level = BatchEntry {
            station_id: Some(B.to_string()),
            congestion_level: None,
        };
        let err = service
            .set_levels_batch(vec![entry(A, "low"), entry(C, "high"), missing_level])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: Level must be 'low', 'medium', or 'high' for 2"
        );

        assert!(repo.is_empty());
    }

    /// Returns a fixed record list regardless of the filter, the way a store
    /// with duplicate documents or a loose query can.
    struct FixedRepository {
        records: Vec<CongestionRecord>,
    }

    #[async_trait::async_trait]
    impl CongestionRepository for FixedRepository {
        async fn find_by_charger_ids(
            &self,
            _charger_ids: &[ObjectId],
        ) -> Result<Vec<CongestionRecord>, AppError> {
            Ok(self.records.clone())
        }

        async fn upsert_level(
            &self,
            _charger_id: ObjectId,
            _level: CongestionLevel,
        ) -> Result<UpsertOutcome, AppError> {
            Ok(UpsertOutcome::Unchanged)
        }

        async fn delete_level(&self, _charger_id: ObjectId) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    fn stored(id: &str, level: CongestionLevel) -> CongestionRecord {
        let mut record = CongestionRecord::new(ObjectId::parse_str(id).unwrap(), level);
        record.id = Some(ObjectId::new());
        record
    }

    #[tokio::test]
    async fn unrequested_records_are_dropped_and_first_duplicate_wins() {
        let first_b = stored(B, CongestionLevel::Low);
        let repository = FixedRepository {
            records: vec![
                stored(C, CongestionLevel::High),
                first_b.clone(),
                stored(B, CongestionLevel::High),
                stored(A, CongestionLevel::Medium),
            ],
        };
        let service = CongestionService::new(Arc::new(repository), 100);

        let levels = service.get_levels(&ids(&[B, A, B])).await.unwrap();

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], first_b);
        assert_eq!(levels[1].charger_id.to_hex(), A);
        assert_eq!(levels[1].congestion_level, CongestionLevel::Medium);
    }
}
