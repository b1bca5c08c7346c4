pub mod congestion;

pub use congestion::{
    BatchPrediction, BatchUpdateRequest, BatchUpdateResponse, CongestionLevelEntry,
    CongestionLevelsData, GetCongestionLevelsRequest, GetCongestionLevelsResponse,
    LevelQuery, MessageResponse,
};
