use tracing::debug;

use crate::core::SequenceType;
use crate::matching::scoring::AlleleDistance;
use crate::matching::AssignError;

/// A reference scored against the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    /// Position of the reference in the database
    pub position: usize,
    pub st: SequenceType,
    pub score: AlleleDistance,
}

impl ScoredCandidate {
    #[must_use]
    pub fn new(position: usize, st: SequenceType, score: AlleleDistance) -> Self {
        Self { position, st, score }
    }

    /// Ordering key: distance, then total gaps, then ST
    fn rank(&self) -> (usize, usize, SequenceType) {
        (self.score.distance, self.score.total_gaps(), self.st)
    }
}

/// Picks the single best candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchSelector {
    max_gaps: Option<usize>,
}

impl MatchSelector {
    /// `max_gaps` excludes candidates with that many gaps or more
    #[must_use]
    pub fn new(max_gaps: Option<usize>) -> Self {
        Self { max_gaps }
    }

    /// Select the candidate with the lowest distance. Ties go to the candidate
    /// with fewer gaps, then to the lowest ST.
    ///
    /// # Errors
    ///
    /// Returns `AssignError::NoCandidates` if there are no candidates, or none
    /// within the gap limit.
    pub fn select(
        &self,
        candidates: impl IntoIterator<Item = ScoredCandidate>,
    ) -> Result<ScoredCandidate, AssignError> {
        let mut filtered = 0usize;
        let best = candidates
            .into_iter()
            .filter(|c| match self.max_gaps {
                Some(limit) if c.score.total_gaps() >= limit => {
                    filtered += 1;
                    false
                }
                _ => true,
            })
            .min_by_key(ScoredCandidate::rank);

        if filtered > 0 {
            debug!("Excluded {filtered} candidates over the gap limit");
        }

        best.ok_or(AssignError::NoCandidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(st: u64, distance: usize, gaps_b: usize) -> ScoredCandidate {
        ScoredCandidate::new(
            0,
            SequenceType(st),
            AlleleDistance {
                distance,
                gaps_b,
                ..AlleleDistance::default()
            },
        )
    }

    #[test]
    fn test_lowest_distance_wins() {
        let selector = MatchSelector::default();
        let best = selector
            .select(vec![candidate(1, 5, 0), candidate(2, 2, 9), candidate(3, 4, 0)])
            .unwrap();
        assert_eq!(best.st, SequenceType(2));
    }

    #[test]
    fn test_ties_prefer_fewer_gaps_then_lower_st() {
        let selector = MatchSelector::default();
        let best = selector
            .select(vec![candidate(7, 1, 3), candidate(9, 1, 0), candidate(8, 1, 0)])
            .unwrap();
        assert_eq!(best.st, SequenceType(8));
    }

    #[test]
    fn test_order_independent() {
        let selector = MatchSelector::default();
        let mut candidates = vec![candidate(4, 2, 1), candidate(3, 2, 1), candidate(5, 2, 0)];
        let first = selector.select(candidates.clone()).unwrap();
        candidates.reverse();
        assert_eq!(selector.select(candidates).unwrap(), first);
        assert_eq!(first.st, SequenceType(5));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            MatchSelector::default().select(Vec::new()),
            Err(AssignError::NoCandidates)
        );
    }

    #[test]
    fn test_gap_limit() {
        let selector = MatchSelector::new(Some(2));
        let best = selector
            .select(vec![candidate(1, 0, 5), candidate(2, 3, 1)])
            .unwrap();
        assert_eq!(best.st, SequenceType(2));

        assert_eq!(
            selector.select(vec![candidate(1, 0, 2)]),
            Err(AssignError::NoCandidates)
        );
    }
}
