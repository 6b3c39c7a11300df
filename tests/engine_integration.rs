//! End-to-end flows through the public engine API.

use predictfluence::config::EngineConfig;
use predictfluence::data::{synthetic_frame, FeatureFrame, FixtureSource, SyntheticSource};
use predictfluence::engine::DEFAULT_SHRINKAGE_K;
use predictfluence::error::EngineError;
use predictfluence::scoring::PredictedSegment;
use predictfluence::InsightEngine;
use tempfile::tempdir;

fn engine_at(dir: &std::path::Path) -> InsightEngine {
    InsightEngine::new(EngineConfig {
        models_dir: dir.join("models"),
        outputs_dir: dir.join("outputs"),
        ..Default::default()
    })
}

#[test]
fn training_on_400_synthetic_rows_beats_constant_baseline() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    let report = engine
        .train_regression(&SyntheticSource::new(400, 42))
        .unwrap();

    assert_eq!(report.n_rows, 400);
    assert!(!report.used_synthetic);
    assert!(report.r2 > 0.0, "expected positive holdout r2, got {}", report.r2);
    assert!(report.model_version.starts_with("model-"));
}

#[test]
fn persisted_model_round_trips_into_a_fresh_engine() {
    let dir = tempdir().unwrap();
    let probe = synthetic_frame(25, 9);

    let mut first = engine_at(dir.path());
    first.train_regression(&SyntheticSource::new(300, 42)).unwrap();
    let before: Vec<f64> = probe
        .rows()
        .iter()
        .map(|r| first.predict(r).unwrap().predicted_engagement_rate)
        .collect();

    // A new engine over the same store must resolve the same latest bundle
    // and reproduce predictions bit for bit.
    let mut second = engine_at(dir.path());
    for (row, expected) in probe.rows().iter().zip(&before) {
        let p = second.predict(row).unwrap();
        assert_eq!(p.predicted_engagement_rate, *expected);
    }
}

#[test]
fn unseen_categories_predict_without_error() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());
    engine.train_regression(&SyntheticSource::new(200, 42)).unwrap();

    let mut row = synthetic_frame(1, 3).rows()[0].clone();
    row.content_type = Some("Hologram".into());
    row.category = Some("Quantum".into());
    row.audience_top_country = Some("Atlantis".into());

    let prediction = engine.predict(&row).unwrap();
    assert!(prediction.predicted_engagement_rate.is_finite());
}

#[test]
fn batch_segments_partition_and_order_the_batch() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    let source = SyntheticSource::new(300, 42);
    engine.train_regression(&source).unwrap();
    let result = engine.batch_score(&source).unwrap();

    let counts = result.segment_counts;
    assert_eq!(counts.total(), 300);
    assert!(counts.a > 0 && counts.b > 0 && counts.c > 0);

    // Every A prediction >= every B prediction >= every C prediction.
    let min_of = |segment: PredictedSegment| {
        result
            .predictions
            .iter()
            .filter(|p| p.segment == segment)
            .map(|p| p.predicted_engagement_rate)
            .fold(f64::INFINITY, f64::min)
    };
    let max_of = |segment: PredictedSegment| {
        result
            .predictions
            .iter()
            .filter(|p| p.segment == segment)
            .map(|p| p.predicted_engagement_rate)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    assert!(min_of(PredictedSegment::A) >= max_of(PredictedSegment::B));
    assert!(min_of(PredictedSegment::B) >= max_of(PredictedSegment::C));

    // Output lands under the documented name.
    let name = result.output_path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, format!("batch_predictions_{}.csv", result.model_version));
}

#[test]
fn clustering_thirty_influencers_into_five_clusters() {
    let dir = tempdir().unwrap();
    let engine = engine_at(dir.path());

    // 120 posts spread across exactly 30 influencers.
    let base = synthetic_frame(120, 42);
    let rows: Vec<_> = base
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = r.clone();
            row.influencer_id = (i % 30) as i64 + 1;
            row
        })
        .collect();
    let source = FixtureSource::new(FeatureFrame::new(rows));

    let assignments = engine.clusters(&source, 5).unwrap();
    assert_eq!(assignments.len(), 30);

    let mut histogram = [0usize; 5];
    for a in &assignments {
        assert!(a.cluster < 5);
        histogram[a.cluster] += 1;
    }
    assert_eq!(histogram.iter().sum::<usize>(), 30);
}

#[test]
fn skill_scores_shrink_low_volume_influencers() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());
    engine.train_regression(&SyntheticSource::new(300, 42)).unwrap();

    let records = engine
        .skill_scores(&SyntheticSource::new(300, 42), DEFAULT_SHRINKAGE_K)
        .unwrap();

    // Synthetic rows carry one post per influencer: weight = 1 / (1 + 5).
    assert!(!records.is_empty());
    for r in &records {
        assert_eq!(r.n_posts, 1);
        assert!((r.shrinkage_weight - 1.0 / 6.0).abs() < 1e-12);
        assert!((r.skill_score - r.mean_residual * r.shrinkage_weight).abs() < 1e-12);
    }

    // Sorted descending by skill score.
    for pair in records.windows(2) {
        assert!(pair[0].skill_score >= pair[1].skill_score);
    }
}

#[test]
fn posting_schedule_produces_sorted_side_outputs() {
    let dir = tempdir().unwrap();
    let engine = engine_at(dir.path());

    let report = engine
        .posting_schedule(&SyntheticSource::new(400, 42))
        .unwrap();

    let by_day = report.by_day.expect("synthetic rows carry post dates");
    for pair in by_day.windows(2) {
        assert!(pair[0].avg_engagement_rate >= pair[1].avg_engagement_rate);
    }

    let outputs: Vec<String> = std::fs::read_dir(dir.path().join("outputs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(outputs.iter().any(|n| n.starts_with("schedule_by_day_")));
    assert!(outputs.iter().any(|n| n.starts_with("schedule_by_hour_")));
}

#[test]
fn tier_and_segment_schemes_stay_distinct() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    let source = SyntheticSource::new(300, 42);
    engine.train_regression(&source).unwrap();
    let tier_report = engine.train_tier(&source).unwrap();

    // Distinct namespaces, distinct version prefixes.
    assert!(tier_report.model_version.starts_with("tier-"));
    let batch = engine.batch_score(&source).unwrap();
    assert!(batch.model_version.starts_with("model-"));

    // Both classifiers produce valid labels for the same row.
    let row = synthetic_frame(1, 5).rows()[0].clone();
    let tier = engine.predict_tier(&row).unwrap();
    assert!(["A", "B", "C"].contains(&tier.tier.as_str()));
}

#[test]
fn empty_sources_fail_fast_where_fallback_is_forbidden() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());
    engine.train_regression(&SyntheticSource::new(100, 42)).unwrap();

    // Batch scoring takes its input as-is: an empty source is an error even
    // though a model exists.
    let err = engine
        .batch_score(&FixtureSource::new(FeatureFrame::default()))
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyDataset));
}
