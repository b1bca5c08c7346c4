use crate::models::{CongestionLevel, CongestionRecord};
use crate::services::BatchEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct GetCongestionLevelsRequest {
    #[serde(rename = "stationIds")]
    pub station_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CongestionLevelEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "chargerId")]
    pub charger_id: String,
    pub congestion_level: CongestionLevel,
}

impl From<CongestionRecord> for CongestionLevelEntry {
    fn from(record: CongestionRecord) -> Self {
        Self {
            id: record.id.map(|id| id.to_hex()),
            charger_id: record.charger_id.to_hex(),
            congestion_level: record.congestion_level,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CongestionLevelsData {
    #[serde(rename = "congestionLevels")]
    pub congestion_levels: Vec<CongestionLevelEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetCongestionLevelsResponse {
    pub message: String,
    pub data: CongestionLevelsData,
}

/// Query string for `PUT` and `DELETE /congestion`.
#[derive(Debug, Deserialize)]
pub struct LevelQuery {
    pub id: Option<String>,
    pub level: Option<String>,
}

/// One prediction as sent by the pipeline. Fields are kept loosely typed so
/// that a wrong type or a missing field is reported with its index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(default)]
    pub station_id: Option<Value>,
    #[serde(default)]
    pub congestion_level: Option<Value>,
}

impl From<BatchPrediction> for BatchEntry {
    fn from(p: BatchPrediction) -> Self {
        BatchEntry {
            station_id: p.station_id.as_ref().and_then(Value::as_str).map(str::to_owned),
            congestion_level: p
                .congestion_level
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }
}

/// Payload produced by the prediction pipeline.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchUpdateRequest {
    #[validate(length(min = 1, message = "At least one prediction must be provided"))]
    pub predictions: Vec<BatchPrediction>,
    /// Number of predictions as reported by the producer. Informational.
    #[serde(default)]
    pub count: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
