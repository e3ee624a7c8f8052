//! Composite importance scoring and ranking.
//!
//! Scores are min-max normalised over the batch being ranked, weighted by
//! the persisted score-weight configuration, and mapped onto 0..=100.
//! Ranking is total and deterministic: ties break by file count, then
//! recency, then name.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::config::ScoreWeights;
use crate::core::model::ScoreBreakdown;

/// Signals one project contributes to a scoring batch.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    /// Project being scored
    pub project_id: Uuid,
    /// Display name, used as the final ranking tie-break
    pub name: String,
    /// User contribution percentage; solo projects report 100
    pub contribution_pct: f64,
    /// Distinct tools + practices detected
    pub diversity: usize,
    /// Days between first and last commit (0 without history)
    pub duration_days: f64,
    /// Files in the project
    pub file_count: usize,
    /// Last commit timestamp, used as a ranking tie-break
    pub last_commit: Option<DateTime<Utc>>,
}

/// Score and rank for one project.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Scored project
    pub project_id: Uuid,
    /// Composite score, 0..=100
    pub score: f64,
    /// Weighted components
    pub breakdown: ScoreBreakdown,
    /// Assigned rank, 1-based
    pub rank: u32,
}

/// Score a batch of projects and assign ranks.
///
/// Deterministic given inputs: two calls with the same batch produce the
/// same scores and the same ordering.
pub fn score_batch(inputs: &[ScoreInput], weights: &ScoreWeights) -> Vec<ScoreOutcome> {
    if inputs.is_empty() {
        return Vec::new();
    }

    let weight_total = weights.total();

    let contribution = Normalizer::over(inputs.iter().map(|i| i.contribution_pct));
    let diversity = Normalizer::over(inputs.iter().map(|i| i.diversity as f64));
    let duration = Normalizer::over(inputs.iter().map(|i| i.duration_days));
    let file_count = Normalizer::over(inputs.iter().map(|i| i.file_count as f64));

    let mut outcomes: Vec<(usize, ScoreOutcome)> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let breakdown = if weight_total > 0.0 {
                ScoreBreakdown {
                    contribution: weights.contribution / weight_total
                        * contribution.normalize(input.contribution_pct),
                    diversity: weights.diversity / weight_total
                        * diversity.normalize(input.diversity as f64),
                    duration: weights.duration / weight_total
                        * duration.normalize(input.duration_days),
                    file_count: weights.file_count / weight_total
                        * file_count.normalize(input.file_count as f64),
                }
            } else {
                ScoreBreakdown::default()
            };

            let outcome = ScoreOutcome {
                project_id: input.project_id,
                score: breakdown.total(),
                breakdown,
                rank: 0,
            };
            (index, outcome)
        })
        .collect();

    // Rank: score desc, file_count desc, last_commit desc, name asc.
    outcomes.sort_by(|(a_idx, a), (b_idx, b)| {
        let a_in = &inputs[*a_idx];
        let b_in = &inputs[*b_idx];
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_in.file_count.cmp(&a_in.file_count))
            .then_with(|| b_in.last_commit.cmp(&a_in.last_commit))
            .then_with(|| a_in.name.cmp(&b_in.name))
    });

    outcomes
        .into_iter()
        .enumerate()
        .map(|(position, (_, mut outcome))| {
            outcome.rank = position as u32 + 1;
            outcome
        })
        .collect()
}

/// Min-max normaliser over the current batch.
struct Normalizer {
    min: f64,
    max: f64,
}

impl Normalizer {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            min = min.min(value);
            max = max.max(value);
        }
        Self { min, max }
    }

    fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            (value - self.min) / span
        } else if self.max > 0.0 {
            // Degenerate batch (all equal, or a single project): a present
            // signal counts fully rather than vanishing.
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn input(name: &str, contribution: f64, diversity: usize, days: f64, files: usize) -> ScoreInput {
        ScoreInput {
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            contribution_pct: contribution,
            diversity,
            duration_days: days,
            file_count: files,
            last_commit: None,
        }
    }

    #[test]
    fn test_scores_are_bounded_and_ordered() {
        let inputs = vec![
            input("big", 100.0, 12, 365.0, 200),
            input("small", 20.0, 2, 10.0, 5),
        ];
        let outcomes = score_batch(&inputs, &ScoreWeights::default());

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].project_id, inputs[0].project_id);
        assert_eq!(outcomes[0].rank, 1);
        assert_eq!(outcomes[1].rank, 2);
        assert!((outcomes[0].score - 100.0).abs() < 1e-9);
        assert!(outcomes[1].score.abs() < 1e-9);
    }

    #[test]
    fn test_single_project_scores_full_signal() {
        let inputs = vec![input("only", 100.0, 4, 30.0, 10)];
        let outcomes = score_batch(&inputs, &ScoreWeights::default());
        assert!((outcomes[0].score - 100.0).abs() < 1e-9);
        assert_eq!(outcomes[0].rank, 1);
    }

    #[test]
    fn test_ranks_are_a_permutation() {
        let inputs: Vec<ScoreInput> = (0..10)
            .map(|i| input(&format!("p{i}"), i as f64 * 10.0, i, i as f64, i * 3))
            .collect();
        let outcomes = score_batch(&inputs, &ScoreWeights::default());

        let mut ranks: Vec<u32> = outcomes.iter().map(|o| o.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=10).collect::<Vec<u32>>());
    }

    #[test]
    fn test_tie_breaks_by_file_count_then_name() {
        // Identical signals except file count.
        let a = input("alpha", 50.0, 3, 10.0, 10);
        let b = input("beta", 50.0, 3, 10.0, 40);
        let outcomes = score_batch(&[a.clone(), b.clone()], &ScoreWeights::default());
        assert_eq!(outcomes[0].project_id, b.project_id);

        // Fully identical: lexicographic name decides.
        let c = input("aaa", 50.0, 3, 10.0, 10);
        let d = input("bbb", 50.0, 3, 10.0, 10);
        let outcomes = score_batch(&[d.clone(), c.clone()], &ScoreWeights::default());
        assert_eq!(outcomes[0].project_id, c.project_id);
    }

    #[test]
    fn test_recency_breaks_ties_before_name() {
        let older = Utc.timestamp_opt(1_600_000_000, 0).single();
        let newer = Utc.timestamp_opt(1_700_000_000, 0).single();

        let mut a = input("zzz", 50.0, 3, 10.0, 10);
        a.last_commit = newer;
        let mut b = input("aaa", 50.0, 3, 10.0, 10);
        b.last_commit = older;

        let outcomes = score_batch(&[a.clone(), b.clone()], &ScoreWeights::default());
        assert_eq!(outcomes[0].project_id, a.project_id);
    }

    #[test]
    fn test_unnormalised_weights_are_normalised_internally() {
        let inputs = vec![
            input("big", 100.0, 12, 365.0, 200),
            input("small", 20.0, 2, 10.0, 5),
        ];
        let doubled = ScoreWeights {
            contribution: 0.70,
            diversity: 0.50,
            duration: 0.40,
            file_count: 0.40,
        };
        let default_scores = score_batch(&inputs, &ScoreWeights::default());
        let doubled_scores = score_batch(&inputs, &doubled);
        for (a, b) in default_scores.iter().zip(doubled_scores.iter()) {
            assert_abs_diff_eq!(a.score, b.score, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let inputs = vec![
            input("a", 33.0, 5, 120.0, 42),
            input("b", 66.0, 1, 10.0, 9),
            input("c", 50.0, 8, 240.0, 17),
        ];
        let first = score_batch(&inputs, &ScoreWeights::default());
        let second = score_batch(&inputs, &ScoreWeights::default());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.project_id, b.project_id);
            assert!((a.score - b.score).abs() < f64::EPSILON);
            assert_eq!(a.rank, b.rank);
        }
    }
}
