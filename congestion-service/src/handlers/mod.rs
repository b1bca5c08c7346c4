pub mod congestion;
pub mod health;

pub use congestion::{
    delete_congestion_level, get_congestion_levels, post_congestion_levels_batch,
    put_congestion_level,
};
pub use health::{health_check, metrics_endpoint, readiness_check};
