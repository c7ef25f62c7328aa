use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::distance::DistanceUnit;
use crate::models::domain::NewRecord;

/// Request to store a single record
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRecordRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<CreateRecordRequest> for NewRecord {
    fn from(req: CreateRecordRequest) -> Self {
        NewRecord {
            name: req.name,
            latitude: req.latitude,
            longitude: req.longitude,
            tags: req.tags,
        }
    }
}

/// Request to store several records in one transaction
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchCreateRequest {
    #[validate(length(min = 1, max = 1000), nested)]
    pub records: Vec<CreateRecordRequest>,
}

/// Request to find the records closest to a point
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClosestQueryRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Distance cutoff in `unit`; absent or zero means unbounded
    #[serde(default, alias = "max_distance", rename = "maxDistance")]
    #[validate(range(min = 0.0))]
    pub max_distance: Option<f64>,
    /// Absent or zero means the server-side ceiling applies
    #[serde(default, alias = "max_count", rename = "maxCount")]
    pub max_count: Option<usize>,
    #[serde(default)]
    pub unit: DistanceUnit,
}
