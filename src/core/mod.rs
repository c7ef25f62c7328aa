// Core algorithm exports
pub mod distance;
pub mod evaluator;
pub mod geo_closest;
pub mod predicate;

pub use distance::{haversine_distance, geodesic_distance, calculate_bounding_box, is_within_bounding_box, DistanceMetric, DistanceUnit};
pub use evaluator::{Evaluator, Evaluation, Matched};
pub use geo_closest::GeoClosest;
pub use predicate::{Located, Predicate, PredicateError, WithinBox};
