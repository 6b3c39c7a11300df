//! Strongly-typed observation rows and the frame that carries them.
//!
//! One [`FeatureRow`] is a single content observation: numeric and categorical
//! inputs, the engagement target, identifiers, and optional calendar fields
//! used by the schedule analyzer. Feature fields are `Option`-carried; the
//! preprocessing pipeline owns imputation, so a `None` here is data, not an
//! error. A *column* is considered missing from a frame only when no row at
//! all carries a value for it.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::{CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGET_COLUMN};
use crate::error::{EngineError, Result};

// ============================================================================
// FeatureRow
// ============================================================================

/// A single observation: inputs for prediction plus target and identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub content_id: i64,
    pub influencer_id: i64,

    // Numeric features
    pub follower_count: Option<f64>,
    pub tag_count: Option<f64>,
    pub caption_length: Option<f64>,

    // Categorical features
    pub content_type: Option<String>,
    pub category: Option<String>,
    pub audience_top_country: Option<String>,

    /// Target; present on historical rows, absent on pure predict payloads.
    pub engagement_rate: Option<f64>,

    /// Calendar date of the post (feeds the by-day schedule aggregate).
    pub post_date: Option<NaiveDate>,

    /// Full timestamp of the post (feeds the by-hour schedule aggregate).
    pub posted_at: Option<NaiveDateTime>,
}

impl FeatureRow {
    /// Look up a numeric feature by contract name.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "follower_count" => self.follower_count,
            "tag_count" => self.tag_count,
            "caption_length" => self.caption_length,
            _ => None,
        }
    }

    /// Look up a categorical feature by contract name.
    pub fn categorical(&self, name: &str) -> Option<&str> {
        match name {
            "content_type" => self.content_type.as_deref(),
            "category" => self.category.as_deref(),
            "audience_top_country" => self.audience_top_country.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// FeatureFrame
// ============================================================================

/// An owned collection of rows with column-presence introspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    /// Wrap a row collection.
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Whether any row carries a value for the named feature column.
    pub fn has_column(&self, name: &str) -> bool {
        if name == TARGET_COLUMN {
            return self.rows.iter().any(|r| r.engagement_rate.is_some());
        }
        self.rows
            .iter()
            .any(|r| r.numeric(name).is_some() || r.categorical(name).is_some())
    }

    /// Validate that every feature column in `names` is populated.
    ///
    /// Surfaces every offending column name at once.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.has_column(n))
            .map(|n| n.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::MissingColumns { columns: missing })
        }
    }

    /// Validate the full feature contract (all numeric + categorical columns).
    pub fn require_feature_columns(&self) -> Result<()> {
        let mut names: Vec<&str> = Vec::new();
        names.extend(CATEGORICAL_FEATURES);
        names.extend(NUMERIC_FEATURES);
        self.require_columns(&names)
    }

    /// Validate that the target column is populated.
    pub fn require_target(&self) -> Result<()> {
        self.require_columns(&[TARGET_COLUMN])
    }

    /// Rows that carry a target value, paired with it.
    pub fn labeled_rows(&self) -> impl Iterator<Item = (&FeatureRow, f64)> {
        self.rows
            .iter()
            .filter_map(|r| r.engagement_rate.map(|t| (r, t)))
    }

    /// A new frame containing the rows at the given indices, in order.
    pub fn select(&self, indices: &[usize]) -> FeatureFrame {
        FeatureFrame::new(indices.iter().map(|&i| self.rows[i].clone()).collect())
    }

    /// A new frame containing only rows with a target value.
    pub fn labeled(&self) -> FeatureFrame {
        FeatureFrame::new(
            self.rows
                .iter()
                .filter(|r| r.engagement_rate.is_some())
                .cloned()
                .collect(),
        )
    }
}

impl FromIterator<FeatureRow> for FeatureFrame {
    fn from_iter<T: IntoIterator<Item = FeatureRow>>(iter: T) -> Self {
        FeatureFrame::new(iter.into_iter().collect())
    }
}
