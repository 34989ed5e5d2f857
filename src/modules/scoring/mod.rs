//! Authority scoring from validated per-engine backlink counts.
//!
//! Counts are combined into a weighted total, compressed onto a 0-100 scale
//! with a log10 curve, and topped up with a small bonus for corroboration
//! across independent engines.

use std::collections::HashMap;

use crate::probes::Engine;

/// Relative trust placed in each engine's reported counts.
fn default_weights() -> HashMap<Engine, f64> {
    HashMap::from([
        (Engine::Bing, 1.0),
        (Engine::DuckDuckGo, 0.8),
        (Engine::Mojeek, 0.6),
        (Engine::Yandex, 0.6),
        (Engine::Brave, 0.5),
        (Engine::Yahoo, 0.5),
        (Engine::Baidu, 0.4),
        (Engine::Google, 0.3),
    ])
}

/// Full scoring breakdown for one domain.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthorityScore {
    pub domain: String,
    pub counts: HashMap<Engine, u64>,
    pub weighted_total: f64,
    pub log_score: u32,
    pub diversity_bonus: u32,
    pub final_score: u32,
}

/// Turns per-engine counts into a single 0-100 authority score.
#[derive(Debug, Clone)]
pub struct AuthorityScorer {
    weights: HashMap<Engine, f64>,
}

impl AuthorityScorer {
    pub fn new() -> Self {
        Self {
            weights: default_weights(),
        }
    }

    /// Override the default engine weights. Engines missing from the map
    /// contribute nothing to the weighted total.
    pub fn with_weights(weights: HashMap<Engine, f64>) -> Self {
        Self { weights }
    }

    pub fn score(&self, domain: &str, counts: &HashMap<Engine, u64>) -> AuthorityScore {
        let weighted_total: f64 = counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(engine, count)| {
                *count as f64 * self.weights.get(engine).copied().unwrap_or(0.0)
            })
            .sum();

        // log10(1e7) saturates the curve; anything past ten million weighted
        // backlinks reads as maximal raw authority.
        let log_score = if weighted_total >= 1.0 {
            ((weighted_total.log10() / 7.0) * 100.0).trunc().clamp(0.0, 100.0) as u32
        } else {
            0
        };

        let diversity_bonus = self.diversity_bonus(counts);
        let final_score = (log_score + diversity_bonus).min(100);

        log::debug!(
            "scored {domain}: weighted total {weighted_total:.1}, log {log_score}, \
             diversity {diversity_bonus}, final {final_score}"
        );

        AuthorityScore {
            domain: domain.to_string(),
            counts: counts.clone(),
            weighted_total,
            log_score,
            diversity_bonus,
            final_score,
        }
    }

    /// Corroboration bonus: +5 when the most-trusted engine reports links,
    /// +3 for the runner-up, +1 for every other engine that saw anything.
    fn diversity_bonus(&self, counts: &HashMap<Engine, u64>) -> u32 {
        counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(engine, _)| match engine {
                Engine::Bing => 5,
                Engine::DuckDuckGo => 3,
                _ => 1,
            })
            .sum()
    }
}

impl Default for AuthorityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_worked_example() {
        let scorer = AuthorityScorer::new();
        let counts = HashMap::from([
            (Engine::Bing, 50_000u64),
            (Engine::DuckDuckGo, 20_000),
        ]);
        let score = scorer.score("example.com", &counts);
        // 50000 + 16000 = 66000 weighted; log10 curve -> 68; bonus 5+3.
        assert!((score.weighted_total - 66_000.0).abs() < 1e-9);
        assert_eq!(score.log_score, 68);
        assert_eq!(score.diversity_bonus, 8);
        assert_eq!(score.final_score, 76);
    }

    #[test]
    fn third_engine_adds_its_weight_and_bonus() {
        let scorer = AuthorityScorer::new();
        let counts = HashMap::from([
            (Engine::Bing, 50_000u64),
            (Engine::DuckDuckGo, 10_000),
            (Engine::Google, 2_000),
        ]);
        let score = scorer.score("example.com", &counts);
        // 50000 + 8000 + 600 = 58600 weighted; bonus 5+3+1.
        assert!((score.weighted_total - 58_600.0).abs() < 1e-9);
        assert_eq!(score.diversity_bonus, 9);
        assert_eq!(score.final_score, 77);
    }

    #[test]
    fn empty_counts_score_zero() {
        let scorer = AuthorityScorer::new();
        let score = scorer.score("example.com", &HashMap::new());
        assert_eq!(score.final_score, 0);
        assert_eq!(score.weighted_total, 0.0);
    }

    #[test]
    fn zero_counts_earn_no_bonus() {
        let scorer = AuthorityScorer::new();
        let counts = HashMap::from([(Engine::Bing, 0u64), (Engine::Google, 100)]);
        let score = scorer.score("example.com", &counts);
        assert_eq!(score.diversity_bonus, 1);
    }

    #[test]
    fn tiny_weighted_totals_do_not_underflow() {
        let scorer = AuthorityScorer::new();
        // Google-only with one link: weighted total 0.3, below the log curve.
        let counts = HashMap::from([(Engine::Google, 1u64)]);
        let score = scorer.score("example.com", &counts);
        assert_eq!(score.log_score, 0);
        assert_eq!(score.final_score, 1);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let scorer = AuthorityScorer::new();
        let counts: HashMap<Engine, u64> =
            Engine::ALL.iter().map(|e| (*e, 1_000_000_000u64)).collect();
        let score = scorer.score("example.com", &counts);
        assert_eq!(score.final_score, 100);
    }

    #[test]
    fn more_links_never_lower_the_score() {
        let scorer = AuthorityScorer::new();
        let mut previous = 0;
        for count in [10u64, 1_000, 100_000, 10_000_000] {
            let counts = HashMap::from([(Engine::Bing, count)]);
            let score = scorer.score("example.com", &counts).final_score;
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn diversity_raises_score_at_equal_totals() {
        let scorer = AuthorityScorer::new();
        let single = HashMap::from([(Engine::Bing, 10_000u64)]);
        let spread = HashMap::from([
            (Engine::Bing, 6_000u64),
            (Engine::DuckDuckGo, 5_000u64),
        ]);
        // Both weighted totals are 10000.
        let single_score = scorer.score("example.com", &single);
        let spread_score = scorer.score("example.com", &spread);
        assert_eq!(single_score.weighted_total, spread_score.weighted_total);
        assert!(spread_score.final_score > single_score.final_score);
    }

    #[test]
    fn custom_weights_replace_defaults() {
        let scorer = AuthorityScorer::with_weights(HashMap::from([(Engine::Google, 1.0)]));
        let counts = HashMap::from([(Engine::Bing, 1_000u64), (Engine::Google, 1_000u64)]);
        let score = scorer.score("example.com", &counts);
        assert!((score.weighted_total - 1_000.0).abs() < 1e-9);
    }
}
