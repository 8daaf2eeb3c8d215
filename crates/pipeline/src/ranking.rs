//! Weighted scoring and deterministic ranking of candidates.
//!
//! score = 0.25·avg_rating + 0.05·popularity + 0.05·vote_average
//!       + 0.02·rating_count + 0.40·shared_genres + 0.23·shared_tags
//!
//! Candidates are ordered by score descending, then avg_rating descending,
//! rating_count descending, title ascending and finally movie id ascending,
//! so identical input state always yields the identical list.

use crate::features::CandidateFeatures;
use serde::Deserialize;
use std::cmp::Ordering;

/// Weights of the linear scoring model
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub avg_rating: f64,
    pub popularity: f64,
    pub vote_average: f64,
    pub rating_count: f64,
    pub shared_genres: f64,
    pub shared_tags: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            avg_rating: 0.25,
            popularity: 0.05,
            vote_average: 0.05,
            rating_count: 0.02,
            shared_genres: 0.40,
            shared_tags: 0.23,
        }
    }
}

impl ScoreWeights {
    /// Weighted sum of a candidate's features
    pub fn score(&self, features: &CandidateFeatures) -> f64 {
        self.avg_rating * features.avg_rating as f64
            + self.popularity * features.popularity as f64
            + self.vote_average * features.vote_average as f64
            + self.rating_count * features.rating_count as f64
            + self.shared_genres * features.shared_genres as f64
            + self.shared_tags * features.shared_tags as f64
    }
}

/// A candidate together with its final score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub features: CandidateFeatures,
    pub score: f64,
}

/// Ranking order: better candidates compare as `Less`
pub fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.features.avg_rating.total_cmp(&a.features.avg_rating))
        .then_with(|| b.features.rating_count.cmp(&a.features.rating_count))
        .then_with(|| a.features.title.cmp(&b.features.title))
        .then_with(|| a.features.movie_id.cmp(&b.features.movie_id))
}

/// Score every candidate, sort by the ranking order and keep the first `k`.
///
/// Fewer than `k` candidates simply yield a shorter list.
pub fn rank_and_select(
    features: Vec<CandidateFeatures>,
    weights: &ScoreWeights,
    k: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = features
        .into_iter()
        .map(|features| {
            let score = weights.score(&features);
            ScoredCandidate { features, score }
        })
        .collect();

    scored.sort_by(compare_ranked);
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(id: u32, title: &str, avg_rating: f32, rating_count: u32) -> CandidateFeatures {
        let mut f = CandidateFeatures::new(id, title);
        f.avg_rating = avg_rating;
        f.rating_count = rating_count;
        f
    }

    #[test]
    fn test_score_formula() {
        let mut f = features(1, "C", 4.0, 100);
        f.shared_genres = 1;
        let score = ScoreWeights::default().score(&f);
        assert!((score - 3.4).abs() < 1e-9);

        let mut f = features(2, "X", 2.0, 0);
        f.popularity = 10.0;
        f.vote_average = 8.0;
        f.shared_genres = 2;
        f.shared_tags = 3;
        // 0.5 + 0.5 + 0.4 + 0.8 + 0.69
        let score = ScoreWeights::default().score(&f);
        assert!((score - 2.89).abs() < 1e-6);
    }

    #[test]
    fn test_sorts_by_score_descending() {
        let ranked = rank_and_select(
            vec![
                features(1, "Low", 1.0, 0),
                features(2, "High", 5.0, 0),
                features(3, "Mid", 3.0, 0),
            ],
            &ScoreWeights::default(),
            10,
        );
        let ids: Vec<u32> = ranked.iter().map(|c| c.features.movie_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_tie_break_law() {
        // Zero weights make every score equal, exposing the tie-break chain
        let flat = ScoreWeights {
            avg_rating: 0.0,
            popularity: 0.0,
            vote_average: 0.0,
            rating_count: 0.0,
            shared_genres: 0.0,
            shared_tags: 0.0,
        };
        let ranked = rank_and_select(
            vec![
                features(1, "Zulu", 3.0, 5),
                features(2, "Bravo", 3.0, 9),
                features(3, "Alpha", 3.0, 9),
                features(4, "Alpha", 3.0, 9),
                features(5, "Yankee", 4.5, 1),
            ],
            &flat,
            10,
        );
        let ids: Vec<u32> = ranked.iter().map(|c| c.features.movie_id).collect();
        // avg desc, then count desc, then title asc, then id asc
        assert_eq!(ids, vec![5, 3, 4, 2, 1]);
    }

    #[test]
    fn test_truncates_without_padding() {
        let candidates = vec![features(1, "A", 1.0, 1), features(2, "B", 2.0, 1)];
        assert_eq!(rank_and_select(candidates.clone(), &ScoreWeights::default(), 1).len(), 1);
        assert_eq!(rank_and_select(candidates, &ScoreWeights::default(), 5).len(), 2);
    }

    #[test]
    fn test_handles_empty_input() {
        assert!(rank_and_select(vec![], &ScoreWeights::default(), 10).is_empty());
    }
}
