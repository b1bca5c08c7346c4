//! Application startup and lifecycle management.

use crate::config::CongestionConfig;
use crate::handlers;
use crate::middleware::{require_admin, require_user};
use crate::services::{CongestionService, JwtVerifier, MongoCongestionRepository, MongoDb};
use axum::{
    body::Body,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    make_request_span, metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: CongestionConfig,
    pub db: MongoDb,
    pub congestion: CongestionService,
    pub jwt: JwtVerifier,
}

/// Builds the full HTTP router: congestion routes under the configured base
/// path plus unauthenticated health and metrics probes.
pub fn build_router(state: AppState) -> Router {
    let congestion_routes = Router::new()
        .route(
            "/congestion",
            post(handlers::get_congestion_levels)
                .route_layer(from_fn_with_state(state.clone(), require_user))
                .merge(
                    put(handlers::put_congestion_level)
                        .delete(handlers::delete_congestion_level)
                        .route_layer(from_fn_with_state(state.clone(), require_admin)),
                ),
        )
        .route(
            "/congestion/batch",
            post(handlers::post_congestion_levels_batch)
                .route_layer(from_fn_with_state(state.clone(), require_admin)),
        );

    let api = if state.config.api.base_path.is_empty() {
        congestion_routes
    } else {
        Router::new().nest(&state.config.api.base_path, congestion_routes)
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(api)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connects to MongoDB, prepares indexes and binds the listener.
    /// Port 0 picks a random port, which tests rely on.
    pub async fn build(config: CongestionConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let repository = Arc::new(MongoCongestionRepository::new(&db));
        let state = AppState {
            congestion: CongestionService::new(repository, config.api.max_batch_size),
            jwt: JwtVerifier::new(&config.auth.jwt_secret),
            config: config.clone(),
            db,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Congestion service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &MongoDb {
        &self.state.db
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(std::future::pending::<()>()).await
    }

    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
