pub mod congestion;

pub use congestion::{CongestionLevel, CongestionRecord};
