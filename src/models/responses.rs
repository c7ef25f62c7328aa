use serde::{Deserialize, Serialize};
use crate::models::domain::{ClosestMatch, GeoRecord};
use crate::services::CacheStats;

/// Response for the closest-records endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosestResponse {
    pub matches: Vec<ClosestMatch>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    pub examined: usize,
}

/// Response for batch inserts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreateResponse {
    pub inserted: usize,
    pub records: Vec<GeoRecord>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cache: CacheStats,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
