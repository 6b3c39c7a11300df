//! CSV side outputs consumed by downstream dashboards and exports.
//!
//! Each writer produces one versioned file under the outputs directory and
//! returns its path. Values never contain separators, so no quoting is done.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::insights::{ScheduleReport, SkillScoreRecord};
use crate::scoring::BatchPrediction;

/// Paths of the schedule CSVs that were actually written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulePaths {
    pub by_day: Option<PathBuf>,
    pub by_hour: Option<PathBuf>,
}

fn open(dir: &Path, filename: String) -> Result<(BufWriter<File>, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let writer = BufWriter::new(File::create(&path)?);
    Ok((writer, path))
}

/// Write `feature_importance_{version}.csv`.
pub fn write_feature_importance(
    dir: &Path,
    version: &str,
    importances: &[(String, f64)],
) -> Result<PathBuf> {
    let (mut w, path) = open(dir, format!("feature_importance_{version}.csv"))?;
    writeln!(w, "feature,importance")?;
    for (feature, importance) in importances {
        writeln!(w, "{feature},{importance}")?;
    }
    w.flush()?;
    Ok(path)
}

/// Write `influencer_skill_{version}.csv`.
pub fn write_skill_scores(
    dir: &Path,
    version: &str,
    records: &[SkillScoreRecord],
) -> Result<PathBuf> {
    let (mut w, path) = open(dir, format!("influencer_skill_{version}.csv"))?;
    writeln!(w, "influencer_id,n_posts,mean_residual,shrinkage_weight,skill_score")?;
    for r in records {
        writeln!(
            w,
            "{},{},{},{},{}",
            r.influencer_id, r.n_posts, r.mean_residual, r.shrinkage_weight, r.skill_score
        )?;
    }
    w.flush()?;
    Ok(path)
}

/// Write `schedule_by_day_{version}.csv` / `schedule_by_hour_{version}.csv`
/// for whichever aggregates are present.
pub fn write_schedule(dir: &Path, version: &str, report: &ScheduleReport) -> Result<SchedulePaths> {
    let mut paths = SchedulePaths::default();

    if let Some(by_day) = &report.by_day {
        let (mut w, path) = open(dir, format!("schedule_by_day_{version}.csv"))?;
        writeln!(w, "day_of_week,avg_engagement_rate")?;
        for slot in by_day {
            writeln!(w, "{},{}", slot.day_of_week, slot.avg_engagement_rate)?;
        }
        w.flush()?;
        paths.by_day = Some(path);
    }

    if let Some(by_hour) = &report.by_hour {
        let (mut w, path) = open(dir, format!("schedule_by_hour_{version}.csv"))?;
        writeln!(w, "post_hour,avg_engagement_rate")?;
        for slot in by_hour {
            writeln!(w, "{},{}", slot.post_hour, slot.avg_engagement_rate)?;
        }
        w.flush()?;
        paths.by_hour = Some(path);
    }

    Ok(paths)
}

/// Write `batch_predictions_{version}.csv`.
pub fn write_batch_predictions(
    dir: &Path,
    version: &str,
    predictions: &[BatchPrediction],
) -> Result<PathBuf> {
    let (mut w, path) = open(dir, format!("batch_predictions_{version}.csv"))?;
    writeln!(
        w,
        "content_id,influencer_id,predicted_engagement_rate,segment,model_version"
    )?;
    for p in predictions {
        writeln!(
            w,
            "{},{},{},{},{}",
            p.content_id, p.influencer_id, p.predicted_engagement_rate, p.segment, p.model_version
        )?;
    }
    w.flush()?;
    Ok(path)
}
