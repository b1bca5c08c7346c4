pub mod congestion;
pub mod database;
pub mod jwt;
pub mod metrics;
pub mod repository;

pub use congestion::{BatchEntry, CongestionService};
pub use database::MongoDb;
pub use jwt::{AccessTokenClaims, JwtVerifier, Role};
pub use metrics::{get_metrics, init_metrics};
pub use repository::{
    CongestionRepository, InMemoryCongestionRepository, MongoCongestionRepository, UpsertOutcome,
};
