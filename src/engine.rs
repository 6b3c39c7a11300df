//! Service facade: model registry, training/prediction operations, and the
//! insight workflows, all under one injectable object.
//!
//! There is no global "current model" state: the engine owns an explicit
//! [`ModelRegistry`] that caches the active bundles, loads lazily from the
//! artifact store, and is replaced on retrain. The service layer constructs
//! one engine per process and calls the operations synchronously.

use serde::Serialize;
use tracing::info;

use crate::config::{new_model_version, EngineConfig, FEATURE_COLUMNS};
use crate::data::{resolve_training_data, synthetic_frame, DataSource, FeatureRow};
use crate::error::{ArtifactKind, EngineError, Result};
use crate::insights::{
    cluster_influencers, estimate_influencer_skill, suggest_posting_schedule, ClusterAssignment,
    ScheduleReport, SkillScoreRecord,
};
use crate::model::regression::train_model;
use crate::model::tier::train_tier_classifier;
use crate::model::{HistoricalTier, ModelBundle, TierModelBundle};
use crate::outputs;
use crate::scoring::{run_batch_scoring, BatchScoreResult};
use crate::store::ArtifactStore;

/// Default shrinkage strength for skill estimation.
pub const DEFAULT_SHRINKAGE_K: f64 = 5.0;

// ============================================================================
// Registry and reports
// ============================================================================

/// Explicit cache of the active model bundles.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    pub regression: Option<ModelBundle>,
    pub tier: Option<TierModelBundle>,
}

/// Outcome of a regression training call.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub n_rows: usize,
    pub used_synthetic: bool,
    pub r2: f64,
    pub mae: f64,
    pub model_version: String,
    pub features: Vec<String>,
}

/// Outcome of a tier-classifier training call.
#[derive(Debug, Clone, Serialize)]
pub struct TierTrainReport {
    pub n_rows: usize,
    pub used_synthetic: bool,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub model_version: String,
    pub features: Vec<String>,
}

/// A single engagement-rate prediction.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub predicted_engagement_rate: f64,
    pub model_version: String,
}

/// A single tier prediction.
#[derive(Debug, Clone, Serialize)]
pub struct TierPrediction {
    pub tier: HistoricalTier,
    pub model_version: String,
}

// ============================================================================
// Engine
// ============================================================================

/// The insights engine: training, prediction, insights, and batch scoring.
pub struct InsightEngine {
    config: EngineConfig,
    store: ArtifactStore,
    registry: ModelRegistry,
}

impl InsightEngine {
    /// Build an engine with an empty registry.
    pub fn new(config: EngineConfig) -> Self {
        let store = ArtifactStore::new(config.models_dir.clone());
        Self {
            config,
            store,
            registry: ModelRegistry::default(),
        }
    }

    /// Build an engine around a pre-populated registry (tests, replay).
    pub fn with_registry(config: EngineConfig, registry: ModelRegistry) -> Self {
        let store = ArtifactStore::new(config.models_dir.clone());
        Self {
            config,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Once-per-process bootstrap: load the latest persisted regression model
    /// or, on a cold store, train and persist one from synthetic data so
    /// predictions work immediately. Returns `true` when a bootstrap train
    /// happened.
    ///
    /// Not safe to run concurrently across processes against shared storage
    /// without external coordination.
    pub fn warm_up(&mut self) -> Result<bool> {
        if self.registry.regression.is_some() {
            return Ok(false);
        }
        if let Some(bundle) = self.store.load_latest_regression()? {
            info!(version = %bundle.version, "warm-up loaded persisted model");
            self.registry.regression = Some(bundle);
            return Ok(false);
        }
        self.bootstrap_from_synthetic()?;
        Ok(true)
    }

    /// Train the engagement-rate regressor, persist it, and refresh the
    /// registry. Side output: the feature-importance CSV.
    pub fn train_regression(&mut self, source: &dyn DataSource) -> Result<TrainReport> {
        let (frame, used_synthetic) = resolve_training_data(source, &self.config)?;
        let (mut bundle, r2, mae) = train_model(&frame, self.config.seed)?;
        self.store.save_regression(&mut bundle)?;

        let importances = crate::model::extract_feature_importances(&bundle);
        outputs::write_feature_importance(
            &self.config.outputs_dir,
            &bundle.version,
            &importances,
        )?;

        let report = TrainReport {
            n_rows: frame.len(),
            used_synthetic,
            r2,
            mae,
            model_version: bundle.version.clone(),
            features: FEATURE_COLUMNS.iter().map(|f| f.to_string()).collect(),
        };
        self.registry.regression = Some(bundle);
        Ok(report)
    }

    /// Predict the engagement rate for one row, bootstrapping a model first
    /// if neither registry nor store has one.
    pub fn predict(&mut self, row: &FeatureRow) -> Result<Prediction> {
        self.ensure_regression()?;
        let bundle = self
            .registry
            .regression
            .as_ref()
            .expect("ensure_regression installs a bundle");
        Ok(Prediction {
            predicted_engagement_rate: bundle.predict_row(row),
            model_version: bundle.version.clone(),
        })
    }

    /// Train the A/B/C tier classifier, persist it, and refresh the registry.
    pub fn train_tier(&mut self, source: &dyn DataSource) -> Result<TierTrainReport> {
        let (frame, used_synthetic) = resolve_training_data(source, &self.config)?;
        let (mut bundle, accuracy, macro_f1) = train_tier_classifier(&frame, self.config.seed)?;
        self.store.save_tier(&mut bundle)?;

        let report = TierTrainReport {
            n_rows: frame.len(),
            used_synthetic,
            accuracy,
            macro_f1,
            model_version: bundle.version.clone(),
            features: FEATURE_COLUMNS.iter().map(|f| f.to_string()).collect(),
        };
        self.registry.tier = Some(bundle);
        Ok(report)
    }

    /// Predict the tier for one row. Unlike [`Self::predict`], a missing tier
    /// model is an error: callers must train one first.
    pub fn predict_tier(&mut self, row: &FeatureRow) -> Result<TierPrediction> {
        if self.registry.tier.is_none() {
            self.registry.tier = self.store.load_latest_tier()?;
        }
        let bundle = self
            .registry
            .tier
            .as_ref()
            .ok_or(EngineError::ArtifactNotFound {
                kind: ArtifactKind::Tier,
            })?;
        Ok(TierPrediction {
            tier: bundle.predict_row(row),
            model_version: bundle.version.clone(),
        })
    }

    /// Shrinkage-adjusted per-influencer skill scores against the active
    /// regression model. Side output: the skill CSV.
    pub fn skill_scores(
        &mut self,
        source: &dyn DataSource,
        shrinkage_k: f64,
    ) -> Result<Vec<SkillScoreRecord>> {
        self.ensure_regression()?;
        let bundle = self
            .registry
            .regression
            .as_ref()
            .expect("ensure_regression installs a bundle");

        let (frame, _used_synthetic) = resolve_training_data(source, &self.config)?;
        let records = estimate_influencer_skill(&frame, bundle, shrinkage_k)?;

        let version = new_model_version("skill");
        outputs::write_skill_scores(&self.config.outputs_dir, &version, &records)?;
        Ok(records)
    }

    /// Partition influencers into `k` clusters.
    ///
    /// Cluster labels are stable within a process but arbitrary across runs.
    pub fn clusters(&self, source: &dyn DataSource, k: usize) -> Result<Vec<ClusterAssignment>> {
        let (frame, _used_synthetic) = resolve_training_data(source, &self.config)?;
        let (assignments, _model) = cluster_influencers(&frame, k, self.config.seed)?;
        Ok(assignments)
    }

    /// Best-day / best-hour aggregates. Side outputs: schedule CSVs for the
    /// dimensions present.
    pub fn posting_schedule(&self, source: &dyn DataSource) -> Result<ScheduleReport> {
        let (frame, _used_synthetic) = resolve_training_data(source, &self.config)?;
        let report = suggest_posting_schedule(&frame)?;

        let version = new_model_version("schedule");
        outputs::write_schedule(&self.config.outputs_dir, &version, &report)?;
        Ok(report)
    }

    /// Score a bulk dataset with the latest *persisted* regression model.
    ///
    /// No synthetic substitution and no training fallback here: a missing
    /// artifact or an empty batch fails the call.
    pub fn batch_score(&self, source: &dyn DataSource) -> Result<BatchScoreResult> {
        let frame = source.fetch()?;
        run_batch_scoring(&self.store, &self.config.outputs_dir, &frame)
    }

    fn ensure_regression(&mut self) -> Result<()> {
        if self.registry.regression.is_some() {
            return Ok(());
        }
        if let Some(bundle) = self.store.load_latest_regression()? {
            self.registry.regression = Some(bundle);
            return Ok(());
        }
        self.bootstrap_from_synthetic()
    }

    fn bootstrap_from_synthetic(&mut self) -> Result<()> {
        let frame = synthetic_frame(self.config.synthetic_rows, self.config.seed);
        let (mut bundle, r2, mae) = train_model(&frame, self.config.seed)?;
        self.store.save_regression(&mut bundle)?;
        info!(
            version = %bundle.version,
            r2,
            mae,
            "bootstrapped default model from synthetic data"
        );
        self.registry.regression = Some(bundle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureFrame, FixtureSource, SyntheticSource};
    use tempfile::tempdir;

    fn test_engine(dir: &std::path::Path) -> InsightEngine {
        InsightEngine::new(EngineConfig {
            models_dir: dir.join("models"),
            outputs_dir: dir.join("outputs"),
            synthetic_rows: 120,
            ..Default::default()
        })
    }

    fn sample_row() -> FeatureRow {
        FeatureRow {
            content_id: 1,
            influencer_id: 1,
            follower_count: Some(25_000.0),
            tag_count: Some(4.0),
            caption_length: Some(140.0),
            content_type: Some("Reel".into()),
            category: Some("Fitness".into()),
            audience_top_country: Some("USA".into()),
            ..Default::default()
        }
    }

    #[test]
    fn warm_up_bootstraps_once_then_reuses() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        assert!(engine.warm_up().unwrap(), "cold store should bootstrap");
        assert!(!engine.warm_up().unwrap(), "second warm-up reuses registry");

        // A fresh engine over the same store loads, not retrains.
        let mut second = test_engine(dir.path());
        assert!(!second.warm_up().unwrap());
    }

    #[test]
    fn registry_is_injectable() {
        let dir = tempdir().unwrap();
        let mut trainer_engine = test_engine(dir.path());
        trainer_engine
            .train_regression(&SyntheticSource::new(150, 42))
            .unwrap();
        let bundle = trainer_engine.registry.regression.clone().unwrap();

        // A pre-populated registry serves predictions without touching the
        // store again.
        let registry = ModelRegistry {
            regression: Some(bundle.clone()),
            tier: None,
        };
        let config = EngineConfig {
            models_dir: dir.path().join("elsewhere"),
            outputs_dir: dir.path().join("outputs"),
            ..Default::default()
        };
        let mut engine = InsightEngine::with_registry(config, registry);
        let prediction = engine.predict(&sample_row()).unwrap();
        assert_eq!(prediction.model_version, bundle.version);
    }

    #[test]
    fn predict_works_cold() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let prediction = engine.predict(&sample_row()).unwrap();
        assert!(prediction.predicted_engagement_rate.is_finite());
        assert!(prediction.model_version.starts_with("model-"));
    }

    #[test]
    fn train_regression_reports_synthetic_fallback() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let sparse = FixtureSource::new(FeatureFrame::default());
        let report = engine.train_regression(&sparse).unwrap();
        assert!(report.used_synthetic);
        assert_eq!(report.n_rows, 120);
        assert!(report.r2 > 0.0);

        let dense = SyntheticSource::new(200, 7);
        let report = engine.train_regression(&dense).unwrap();
        assert!(!report.used_synthetic);
        assert_eq!(report.n_rows, 200);
    }

    #[test]
    fn train_regression_writes_importance_csv() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let report = engine.train_regression(&SyntheticSource::new(150, 42)).unwrap();
        let csv = dir
            .path()
            .join("outputs")
            .join(format!("feature_importance_{}.csv", report.model_version));
        assert!(csv.exists());
    }

    #[test]
    fn predict_tier_requires_a_trained_classifier() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let err = engine.predict_tier(&sample_row()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ArtifactNotFound {
                kind: ArtifactKind::Tier
            }
        ));

        engine.train_tier(&SyntheticSource::new(200, 42)).unwrap();
        let prediction = engine.predict_tier(&sample_row()).unwrap();
        assert!(prediction.model_version.starts_with("tier-"));
    }

    #[test]
    fn end_to_end_train_then_batch_score() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let source = SyntheticSource::new(250, 42);
        engine.train_regression(&source).unwrap();

        let result = engine.batch_score(&source).unwrap();
        assert_eq!(result.segment_counts.total(), 250);
        assert!(result.output_path.exists());
    }

    #[test]
    fn batch_score_never_trains_as_fallback() {
        let dir = tempdir().unwrap();
        let engine = test_engine(dir.path());

        let err = engine.batch_score(&SyntheticSource::new(50, 42)).unwrap_err();
        assert!(matches!(err, EngineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn skill_scores_write_side_output() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());

        let records = engine
            .skill_scores(&SyntheticSource::new(150, 42), DEFAULT_SHRINKAGE_K)
            .unwrap();
        assert!(!records.is_empty());

        let outputs: Vec<_> = std::fs::read_dir(dir.path().join("outputs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(outputs.iter().any(|n| n.starts_with("influencer_skill_")));
    }

    #[test]
    fn clusters_and_schedule_run_on_fallback_data() {
        let dir = tempdir().unwrap();
        let engine = test_engine(dir.path());

        let sparse = FixtureSource::new(FeatureFrame::default());
        let assignments = engine.clusters(&sparse, 5).unwrap();
        assert_eq!(assignments.len(), 120);

        let report = engine.posting_schedule(&sparse).unwrap();
        assert!(report.by_day.is_some());
        assert!(report.by_hour.is_some());
    }
}
