use thiserror::Error;

use crate::core::distance::is_within_bounding_box;
use crate::models::{BoundingBox, GeoPoint};

/// Errors raised while building or configuring a predicate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("Invalid latitude: {0} (expected a finite value in [-90, 90])")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (expected a finite value in [-180, 180])")]
    InvalidLongitude(f64),

    #[error("Invalid distance: {0} (expected a finite, non-negative value)")]
    InvalidDistance(f64),
}

/// Anything with a position on the globe
pub trait Located {
    fn location(&self) -> GeoPoint;
}

impl<T: Located + ?Sized> Located for &T {
    fn location(&self) -> GeoPoint {
        (**self).location()
    }
}

/// A filtering condition evaluated against records one at a time
///
/// Predicates may keep state between calls to [`Predicate::matches`] within a
/// single evaluation pass. The evaluator calls [`Predicate::reset`] before
/// each pass and stops feeding records once [`Predicate::should_break`]
/// returns true.
pub trait Predicate<R: ?Sized> {
    /// Clear per-pass state
    fn reset(&mut self) {}

    /// Ordering key; ranked predicates see candidates in ascending rank order
    fn rank(&self, _record: &R) -> Option<f64> {
        None
    }

    fn matches(&mut self, record: &R) -> bool;

    /// True once no remaining candidate can match
    fn should_break(&self) -> bool {
        false
    }

    /// Coarse region every match lies in, for store-side pre-filtering
    fn bounds(&self) -> Option<BoundingBox> {
        None
    }
}

impl<R: ?Sized, P: Predicate<R> + ?Sized> Predicate<R> for &mut P {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn rank(&self, record: &R) -> Option<f64> {
        (**self).rank(record)
    }

    fn matches(&mut self, record: &R) -> bool {
        (**self).matches(record)
    }

    fn should_break(&self) -> bool {
        (**self).should_break()
    }

    fn bounds(&self) -> Option<BoundingBox> {
        (**self).bounds()
    }
}

/// Matches records located inside a bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithinBox {
    bbox: BoundingBox,
}

impl WithinBox {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }
}

impl<R: Located + ?Sized> Predicate<R> for WithinBox {
    #[inline]
    fn matches(&mut self, record: &R) -> bool {
        let point = record.location();
        is_within_bounding_box(point.latitude, point.longitude, &self.bbox)
    }

    fn bounds(&self) -> Option<BoundingBox> {
        Some(self.bbox)
    }
}
