use crate::models::CongestionRecord;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

pub const CONGESTIONS_COLLECTION: &str = "congestions";

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        Ok(Self { client, db })
    }

    /// Creates the `chargerId` index backing lookups and upserts.
    ///
    /// The index is unique so a charger can only have one stored level. When
    /// pre-existing duplicates make that impossible the service still starts
    /// with a plain index and reads the first record found per charger.
    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for congestion-service");

        let unique_index = IndexModel::builder()
            .keys(doc! { "chargerId": 1 })
            .options(
                IndexOptions::builder()
                    .name("charger_id_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        if let Err(e) = self.congestions().create_index(unique_index, None).await {
            tracing::warn!(
                error = %e,
                "Could not create unique chargerId index, falling back to non-unique index"
            );

            let plain_index = IndexModel::builder()
                .keys(doc! { "chargerId": 1 })
                .options(
                    IndexOptions::builder()
                        .name("charger_id_idx".to_string())
                        .build(),
                )
                .build();

            self.congestions()
                .create_index(plain_index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create chargerId index: {}", e);
                    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
                })?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub fn congestions(&self) -> Collection<CongestionRecord> {
        self.db.collection(CONGESTIONS_COLLECTION)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
