//! Data sources and the cold-start synthetic fallback.
//!
//! The engine never talks to storage directly; it consumes a [`DataSource`].
//! Production wires an adapter over the relational layer, tests use
//! [`FixtureSource`], and [`SyntheticSource`] keeps every operation
//! exercisable before real data exists.

use chrono::{Duration, Utc};
use rand::prelude::*;
use tracing::warn;

use crate::config::EngineConfig;
use crate::data::{FeatureFrame, FeatureRow};
use crate::error::Result;

/// Supplies joined observation rows for training and insights.
pub trait DataSource {
    /// Fetch all currently available rows.
    fn fetch(&self) -> Result<FeatureFrame>;
}

/// Fixed in-memory frame, for tests and replay.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    frame: FeatureFrame,
}

impl FixtureSource {
    pub fn new(frame: FeatureFrame) -> Self {
        Self { frame }
    }
}

impl DataSource for FixtureSource {
    fn fetch(&self) -> Result<FeatureFrame> {
        Ok(self.frame.clone())
    }
}

/// Closed-form generators aligned with the production schema.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub n_rows: usize,
    pub seed: u64,
}

impl SyntheticSource {
    pub fn new(n_rows: usize, seed: u64) -> Self {
        Self { n_rows, seed }
    }
}

impl DataSource for SyntheticSource {
    fn fetch(&self) -> Result<FeatureFrame> {
        Ok(synthetic_frame(self.n_rows, self.seed))
    }
}

/// Resolve training data with the degraded-data fallback.
///
/// Below the configured minimum-row threshold the real frame is replaced by
/// synthetic rows; the second return value flags the substitution. This is an
/// availability tradeoff, not an error.
pub fn resolve_training_data(
    source: &dyn DataSource,
    config: &EngineConfig,
) -> Result<(FeatureFrame, bool)> {
    let frame = source.fetch()?;
    if frame.len() >= config.min_training_rows {
        return Ok((frame, false));
    }
    warn!(
        real_rows = frame.len(),
        min_rows = config.min_training_rows,
        synthetic_rows = config.synthetic_rows,
        "insufficient real data, substituting synthetic rows"
    );
    Ok((synthetic_frame(config.synthetic_rows, config.seed), true))
}

// ============================================================================
// Synthetic generators
// ============================================================================

const CONTENT_TYPES: [(&str, f64); 4] = [
    ("Image", 0.35),
    ("Video", 0.35),
    ("Reel", 0.2),
    ("Story", 0.1),
];

const CATEGORIES: [&str; 6] = ["Beauty", "Fitness", "Tech", "Food", "Travel", "Gaming"];

const COUNTRIES: [&str; 7] = ["USA", "UK", "Canada", "Germany", "France", "India", "Brazil"];

/// Generate `n_rows` synthetic observations.
///
/// Follower counts are log-normal (orders-of-magnitude spread), tag counts
/// Poisson, caption lengths uniform, and the engagement target follows a
/// noisy inverse-square-root-of-followers curve, clipped at zero. Posting
/// timestamps are spread over a trailing 90-day window so the schedule
/// analyzer has both dimensions to aggregate.
pub fn synthetic_frame(n_rows: usize, seed: u64) -> FeatureFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let anchor = Utc::now().date_naive();

    let mut rows = Vec::with_capacity(n_rows);
    for i in 0..n_rows {
        let follower_count = sample_lognormal(&mut rng, 10.0, 0.8).floor().max(1.0);
        let tag_count = sample_poisson(&mut rng, 3.0) as f64;
        let caption_length = rng.gen_range(20..240) as f64;
        let content_type = sample_weighted(&mut rng, &CONTENT_TYPES);
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let country = COUNTRIES[rng.gen_range(0..COUNTRIES.len())];

        let base_rate = 0.6 / follower_count.sqrt();
        let engagement_rate = (base_rate
            + 0.003 * tag_count
            + 0.0009 * caption_length
            + 0.04 * sample_standard_normal(&mut rng))
        .max(0.0);

        let post_date = anchor - Duration::days(rng.gen_range(0..90));
        let posted_at = post_date
            .and_hms_opt(rng.gen_range(0..24), rng.gen_range(0..60), 0)
            .expect("in-range time components");

        rows.push(FeatureRow {
            content_id: (i + 1) as i64,
            influencer_id: (i + 1) as i64,
            follower_count: Some(follower_count),
            tag_count: Some(tag_count),
            caption_length: Some(caption_length),
            content_type: Some(content_type.to_string()),
            category: Some(category.to_string()),
            audience_top_country: Some(country.to_string()),
            engagement_rate: Some(engagement_rate),
            post_date: Some(post_date),
            posted_at: Some(posted_at),
        });
    }

    FeatureFrame::new(rows)
}

/// Standard normal via Box-Muller.
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    // Guard the log against u1 == 0.
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Log-normal with the given log-space mean and sigma.
fn sample_lognormal(rng: &mut StdRng, mu: f64, sigma: f64) -> f64 {
    (mu + sigma * sample_standard_normal(rng)).exp()
}

/// Poisson via Knuth's product-of-uniforms method; fine for small lambda.
fn sample_poisson(rng: &mut StdRng, lambda: f64) -> u32 {
    let threshold = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.gen::<f64>();
        if p <= threshold {
            return k;
        }
        k += 1;
    }
}

/// Weighted categorical draw; weights are assumed to sum to one.
fn sample_weighted<'a>(rng: &mut StdRng, choices: &[(&'a str, f64)]) -> &'a str {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    for &(value, weight) in choices {
        acc += weight;
        if u < acc {
            return value;
        }
    }
    choices[choices.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FEATURE_COLUMNS;

    #[test]
    fn synthetic_frame_satisfies_the_feature_contract() {
        let frame = synthetic_frame(50, 42);
        assert_eq!(frame.len(), 50);
        frame.require_feature_columns().unwrap();
        frame.require_target().unwrap();
        for name in FEATURE_COLUMNS {
            assert!(frame.has_column(name), "column {name} missing");
        }
    }

    #[test]
    fn synthetic_frame_is_deterministic_under_a_seed() {
        let a = synthetic_frame(30, 7);
        let b = synthetic_frame(30, 7);
        for (ra, rb) in a.rows().iter().zip(b.rows()) {
            assert_eq!(ra.follower_count, rb.follower_count);
            assert_eq!(ra.engagement_rate, rb.engagement_rate);
            assert_eq!(ra.content_type, rb.content_type);
        }
    }

    #[test]
    fn engagement_is_non_negative_and_followers_positive() {
        let frame = synthetic_frame(200, 42);
        for row in frame.rows() {
            assert!(row.engagement_rate.unwrap() >= 0.0);
            assert!(row.follower_count.unwrap() >= 1.0);
        }
    }

    #[test]
    fn fallback_triggers_below_threshold() {
        let config = EngineConfig {
            min_training_rows: 40,
            synthetic_rows: 100,
            ..Default::default()
        };
        let sparse = FixtureSource::new(synthetic_frame(5, 1));
        let (frame, used_synthetic) = resolve_training_data(&sparse, &config).unwrap();
        assert!(used_synthetic);
        assert_eq!(frame.len(), 100);

        let dense = FixtureSource::new(synthetic_frame(80, 1));
        let (frame, used_synthetic) = resolve_training_data(&dense, &config).unwrap();
        assert!(!used_synthetic);
        assert_eq!(frame.len(), 80);
    }

    #[test]
    fn poisson_stays_near_lambda() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 2000;
        let total: u64 = (0..n).map(|_| sample_poisson(&mut rng, 3.0) as u64).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 3.0).abs() < 0.2, "poisson mean drifted: {mean}");
    }
}
