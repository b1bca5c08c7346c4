use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Coarse occupancy label for a charging station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    /// Never stored; reported for chargers without a record.
    Unknown,
}

impl CongestionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Medium => "medium",
            CongestionLevel::High => "high",
            CongestionLevel::Unknown => "unknown",
        }
    }

    /// Parses a level that clients are allowed to write.
    pub fn parse_assignable(value: &str) -> Option<Self> {
        match value.parse() {
            Ok(CongestionLevel::Unknown) | Err(_) => None,
            Ok(level) => Some(level),
        }
    }
}

impl std::fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CongestionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CongestionLevel::Low),
            "medium" => Ok(CongestionLevel::Medium),
            "high" => Ok(CongestionLevel::High),
            "unknown" => Ok(CongestionLevel::Unknown),
            _ => Err(format!("Invalid congestion level: {}", s)),
        }
    }
}

/// Document stored in the `congestions` collection, one per charger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CongestionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "chargerId")]
    pub charger_id: ObjectId,
    pub congestion_level: CongestionLevel,
}

impl CongestionRecord {
    pub fn new(charger_id: ObjectId, congestion_level: CongestionLevel) -> Self {
        Self {
            id: None,
            charger_id,
            congestion_level,
        }
    }

    /// Placeholder for a charger that has no stored level.
    pub fn unknown(charger_id: ObjectId) -> Self {
        Self::new(charger_id, CongestionLevel::Unknown)
    }
}
