// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{GeoPoint, GeoRecord, NewRecord, ClosestMatch, BoundingBox};
pub use requests::{CreateRecordRequest, BatchCreateRequest, ClosestQueryRequest};
pub use responses::{ClosestResponse, BatchCreateResponse, HealthResponse, ErrorResponse};
