#![allow(dead_code)]

use axum::Router;
use congestion_service::config::{ApiConfig, AuthConfig, CongestionConfig, MongoConfig};
use congestion_service::services::{
    CongestionService, InMemoryCongestionRepository, JwtVerifier, MongoDb,
};
use congestion_service::startup::{build_router, AppState, Application};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "congestion-test-secret";

pub const STATION_A: &str = "674f98013dc8e5d2ac00894a";
pub const STATION_B: &str = "674f97ff3dc8e5d2ac008456";
pub const STATION_C: &str = "674f97ff3dc8e5d2ac008407";

pub fn mongo_uri() -> String {
    std::env::var("TEST_MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

pub fn test_config(database: String, base_path: &str) -> CongestionConfig {
    CongestionConfig {
        common: CoreConfig {
            port: 0,
            ..CoreConfig::default()
        },
        mongodb: MongoConfig {
            uri: mongo_uri(),
            database,
        },
        auth: AuthConfig {
            jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()),
        },
        api: ApiConfig {
            base_path: base_path.to_string(),
            max_batch_size: 50,
        },
    }
}

/// Signed access token for `role`, valid for ten minutes.
pub fn token(role: &str) -> String {
    token_with_secret(role, TEST_JWT_SECRET)
}

pub fn token_with_secret(role: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": format!("{}-tester", role),
        "role": role,
        "iat": now,
        "exp": now + 600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// Router over an in-memory repository. The MongoDB client is created lazily
/// and never contacted unless a health probe is hit.
pub async fn in_memory_app(base_path: &str) -> (Router, InMemoryCongestionRepository) {
    let config = test_config(format!("congestion_unused_{}", Uuid::new_v4()), base_path);
    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .expect("Failed to create MongoDB client");

    let repository = InMemoryCongestionRepository::new();
    let state = AppState {
        congestion: CongestionService::new(
            Arc::new(repository.clone()),
            config.api.max_batch_size,
        ),
        jwt: JwtVerifier::new(&config.auth.jwt_secret),
        config,
        db,
    };

    (build_router(state), repository)
}

pub struct TestApp {
    pub address: String,
    pub db: MongoDb,
}

impl TestApp {
    /// Spawns the real application on a random port against a fresh database.
    pub async fn spawn() -> Self {
        let config = test_config(format!("congestion_test_{}", Uuid::new_v4()), "");

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let address = format!("http://127.0.0.1:{}", app.port());
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, db }
    }

    pub async fn cleanup(&self) {
        self.db.database().drop(None).await.ok();
    }
}
