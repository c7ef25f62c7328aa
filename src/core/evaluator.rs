use crate::core::predicate::Predicate;

/// A candidate accepted by a predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Matched<R> {
    pub record: R,
    /// Rank the predicate assigned, if it ranks
    pub rank: Option<f64>,
}

/// Result of an evaluation pass
#[derive(Debug)]
pub struct Evaluation<R> {
    pub matches: Vec<Matched<R>>,
    pub total_candidates: usize,
    /// Candidates handed to the predicate before it stopped
    pub examined: usize,
}

impl<R> Evaluation<R> {
    pub fn records(self) -> Vec<R> {
        self.matches.into_iter().map(|m| m.record).collect()
    }
}

/// Runs predicates over candidate records
///
/// # Pass
/// 1. Reset predicate state
/// 2. Rank and sort candidates ascending, when the predicate ranks
/// 3. Feed candidates until the predicate breaks or the limit is reached
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    limit: Option<usize>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap on matches independent of the predicate's own limits
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Evaluate `predicate` against `candidates`
    ///
    /// # Arguments
    /// * `predicate` - The condition to apply; its state is reset first
    /// * `candidates` - All potential records
    ///
    /// # Returns
    /// Evaluation with matches in evaluation order
    pub fn evaluate<R, P, I>(&self, predicate: &mut P, candidates: I) -> Evaluation<R>
    where
        P: Predicate<R> + ?Sized,
        I: IntoIterator<Item = R>,
    {
        predicate.reset();

        let mut ranked: Vec<(Option<f64>, R)> = candidates
            .into_iter()
            .map(|record| (predicate.rank(&record), record))
            .collect();
        let total_candidates = ranked.len();

        if ranked.iter().any(|(rank, _)| rank.is_some()) {
            // Unrankable candidates can never be ordered against the rest
            ranked.retain(|(rank, _)| rank.is_some_and(|r| !r.is_nan()));
            ranked.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let mut matches = Vec::new();
        let mut examined = 0;

        for (rank, record) in ranked {
            if predicate.should_break() || self.limit.is_some_and(|l| matches.len() >= l) {
                break;
            }
            examined += 1;
            if predicate.matches(&record) {
                matches.push(Matched { record, rank });
            }
        }

        tracing::trace!(
            "Evaluated {} of {} candidates, {} matched",
            examined,
            total_candidates,
            matches.len()
        );

        Evaluation {
            matches,
            total_candidates,
            examined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo_closest::GeoClosest;
    use crate::core::predicate::WithinBox;
    use crate::core::distance::calculate_bounding_box;
    use crate::models::GeoPoint;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    /// Counts calls to confirm the evaluator stops early
    struct FirstN {
        n: usize,
        seen: usize,
    }

    impl Predicate<u32> for FirstN {
        fn reset(&mut self) {
            self.seen = 0;
        }

        fn matches(&mut self, _record: &u32) -> bool {
            self.seen += 1;
            true
        }

        fn should_break(&self) -> bool {
            self.seen >= self.n
        }
    }

    #[test]
    fn test_unranked_keeps_order_and_breaks() {
        let mut predicate = FirstN { n: 3, seen: 0 };
        let result = Evaluator::new().evaluate(&mut predicate, vec![5u32, 1, 4, 2, 3]);

        assert_eq!(result.examined, 3);
        assert_eq!(result.total_candidates, 5);
        assert_eq!(result.records(), vec![5, 1, 4]);
    }

    #[test]
    fn test_closest_sorted_by_distance() {
        let mut predicate = GeoClosest::new(0.0, 0.0).unwrap().with_max_count(2);
        let candidates = vec![point(0.0, 3.0), point(0.0, 1.0), point(0.0, 2.0)];

        let result = Evaluator::new().evaluate(&mut predicate, candidates);

        assert_eq!(result.records(), vec![point(0.0, 1.0), point(0.0, 2.0)]);
    }

    #[test]
    fn test_closest_stops_past_max_distance() {
        let mut predicate = GeoClosest::new(0.0, 0.0)
            .unwrap()
            .with_max_distance(150.0)
            .unwrap();
        let candidates = vec![point(0.0, 5.0), point(0.0, 1.0), point(0.0, 2.0), point(0.0, 9.0)];

        let result = Evaluator::new().evaluate(&mut predicate, candidates);

        assert_eq!(result.matches.len(), 1);
        // 1° matched, 2° tripped the break, 5° and 9° never examined
        assert_eq!(result.examined, 2);
        let rank = result.matches[0].rank.unwrap();
        assert!((rank - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_evaluator_limit() {
        let mut predicate = GeoClosest::default();
        let candidates: Vec<GeoPoint> = (0..20).map(|i| point(0.0, i as f64 * 0.1)).collect();

        let result = Evaluator::with_limit(5).evaluate(&mut predicate, candidates);

        assert_eq!(result.matches.len(), 5);
        assert_eq!(result.examined, 5);
    }

    #[test]
    fn test_reevaluation_is_repeatable() {
        let mut predicate = GeoClosest::default().with_max_count(1);
        let candidates = vec![point(1.0, 1.0), point(2.0, 2.0)];
        let evaluator = Evaluator::new();

        let first = evaluator.evaluate(&mut predicate, candidates.clone());
        let second = evaluator.evaluate(&mut predicate, candidates);

        assert_eq!(first.records(), second.records());
    }

    #[test]
    fn test_within_box_filters_without_ranking() {
        let mut predicate = WithinBox::new(calculate_bounding_box(40.7128, -74.0060, 10.0));
        let candidates = vec![point(41.5, -74.0), point(40.72, -74.01), point(40.70, -74.00)];

        let result = Evaluator::new().evaluate(&mut predicate, candidates);

        assert_eq!(result.examined, 3);
        assert_eq!(result.records(), vec![point(40.72, -74.01), point(40.70, -74.00)]);
    }
}
