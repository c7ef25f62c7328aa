//! Geo Closest - geo-aware record store with closest-point predicates
//!
//! This library provides the predicate protocol, the GeoClosest predicate and
//! the evaluator that ranks records by distance and stops as soon as no
//! further record can match.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{Evaluator, Evaluation, GeoClosest, Located, Predicate, PredicateError, distance::{haversine_distance, calculate_bounding_box}};
pub use crate::models::{GeoPoint, GeoRecord, NewRecord, BoundingBox, ClosestMatch, ClosestQueryRequest, ClosestResponse};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);
        assert!(bbox.min_lat < 40.7128);

        let predicate = GeoClosest::new(40.7128, -74.0060).unwrap();
        assert!(predicate.distance_to(&GeoPoint::new(40.7128, -74.0060).unwrap()) < 0.001);
    }
}
