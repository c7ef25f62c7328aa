use crate::core::distance::{calculate_bounding_box, DistanceMetric};
use crate::core::predicate::{Located, Predicate, PredicateError};
use crate::models::domain::{validate_latitude, validate_longitude};
use crate::models::{BoundingBox, GeoPoint};

/// Headroom on the pre-filter box so ellipsoidal distances near the edge
/// are not cut by the spherical box
const BBOX_PADDING: f64 = 1.01;

/// Predicate for fetching geographically aware records close to a center
///
/// Candidates are ranked by distance. A candidate matches while it lies
/// within `max_distance` kilometers and fewer than `max_count` records have
/// matched in the current pass. Zero for either limit means unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoClosest {
    latitude: f64,
    longitude: f64,
    max_distance: f64,
    max_count: usize,
    metric: DistanceMetric,
    matched: usize,
    should_break: bool,
}

impl GeoClosest {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, PredicateError> {
        let center = GeoPoint::new(latitude, longitude)?;
        Ok(Self::around(center))
    }

    pub fn around(center: GeoPoint) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            ..Self::default()
        }
    }

    pub fn with_max_distance(mut self, max_distance_km: f64) -> Result<Self, PredicateError> {
        self.set_max_distance(max_distance_km)?;
        Ok(self)
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn set_latitude(&mut self, latitude: f64) -> Result<(), PredicateError> {
        validate_latitude(latitude)?;
        self.latitude = latitude;
        Ok(())
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn set_longitude(&mut self, longitude: f64) -> Result<(), PredicateError> {
        validate_longitude(longitude)?;
        self.longitude = longitude;
        Ok(())
    }

    /// Distance cutoff in kilometers, `0.0` when unbounded
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn set_max_distance(&mut self, max_distance_km: f64) -> Result<(), PredicateError> {
        if !max_distance_km.is_finite() || max_distance_km < 0.0 {
            return Err(PredicateError::InvalidDistance(max_distance_km));
        }
        self.max_distance = max_distance_km;
        Ok(())
    }

    /// Maximum number of matches per pass, `0` when unbounded
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn set_max_count(&mut self, max_count: usize) {
        self.max_count = max_count;
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Matches accepted so far in the current pass
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Distance from the center in kilometers
    #[inline]
    pub fn distance_to<L: Located + ?Sized>(&self, target: &L) -> f64 {
        let point = target.location();
        self.metric
            .distance(self.latitude, self.longitude, point.latitude, point.longitude)
    }

    /// Box containing every point within `max_distance`, `None` when unbounded
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.max_distance > 0.0 {
            Some(calculate_bounding_box(
                self.latitude,
                self.longitude,
                self.max_distance * BBOX_PADDING,
            ))
        } else {
            None
        }
    }
}

impl Default for GeoClosest {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            max_distance: 0.0,
            max_count: 0,
            metric: DistanceMetric::Haversine,
            matched: 0,
            should_break: false,
        }
    }
}

impl<R: Located + ?Sized> Predicate<R> for GeoClosest {
    fn reset(&mut self) {
        self.matched = 0;
        self.should_break = false;
    }

    fn rank(&self, record: &R) -> Option<f64> {
        Some(self.distance_to(record))
    }

    fn matches(&mut self, record: &R) -> bool {
        if self.should_break {
            return false;
        }

        let distance = self.distance_to(record);
        if self.max_distance > 0.0 && distance > self.max_distance {
            // Candidates arrive nearest first, nothing after this can match
            self.should_break = true;
            return false;
        }

        self.matched += 1;
        if self.max_count > 0 && self.matched >= self.max_count {
            self.should_break = true;
        }
        true
    }

    fn should_break(&self) -> bool {
        self.should_break
    }

    fn bounds(&self) -> Option<BoundingBox> {
        self.bounding_box()
    }
}
