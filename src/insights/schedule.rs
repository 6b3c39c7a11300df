//! Posting-schedule aggregates: historical engagement by calendar dimension.

use std::collections::BTreeMap;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::data::FeatureFrame;
use crate::error::{EngineError, Result};

/// Average engagement for one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlot {
    pub day_of_week: String,
    pub avg_engagement_rate: f64,
}

/// Average engagement for one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSlot {
    pub post_hour: u32,
    pub avg_engagement_rate: f64,
}

/// Both schedule aggregates; a side is `None` when the source rows lack the
/// derivable field entirely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub by_day: Option<Vec<DaySlot>>,
    pub by_hour: Option<Vec<HourSlot>>,
}

/// Aggregate historical engagement by day-of-week and hour-of-day.
///
/// Day-of-week derives from the post date; the hour only from the full
/// timestamp, never from a date alone. Each dimension is grouped
/// independently and sorted descending by average engagement, so the first
/// row is the empirically best slot. Low-sample slots are reported as-is,
/// without smoothing.
pub fn suggest_posting_schedule(frame: &FeatureFrame) -> Result<ScheduleReport> {
    if frame.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    frame.require_target()?;

    let mut day_groups: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    let mut hour_groups: BTreeMap<u32, (f64, usize)> = BTreeMap::new();

    for (row, target) in frame.labeled_rows() {
        if let Some(date) = row.post_date {
            let entry = day_groups
                .entry(date.weekday().num_days_from_monday())
                .or_insert((0.0, 0));
            entry.0 += target;
            entry.1 += 1;
        }
        if let Some(at) = row.posted_at {
            let entry = hour_groups.entry(at.hour()).or_insert((0.0, 0));
            entry.0 += target;
            entry.1 += 1;
        }
    }

    let by_day = if day_groups.is_empty() {
        None
    } else {
        let mut slots: Vec<DaySlot> = day_groups
            .into_iter()
            .map(|(day, (sum, count))| DaySlot {
                day_of_week: day_name(day).to_string(),
                avg_engagement_rate: sum / count as f64,
            })
            .collect();
        slots.sort_by(|a, b| {
            b.avg_engagement_rate
                .partial_cmp(&a.avg_engagement_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(slots)
    };

    let by_hour = if hour_groups.is_empty() {
        None
    } else {
        let mut slots: Vec<HourSlot> = hour_groups
            .into_iter()
            .map(|(post_hour, (sum, count))| HourSlot {
                post_hour,
                avg_engagement_rate: sum / count as f64,
            })
            .collect();
        slots.sort_by(|a, b| {
            b.avg_engagement_rate
                .partial_cmp(&a.avg_engagement_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(slots)
    };

    Ok(ScheduleReport { by_day, by_hour })
}

fn day_name(num_days_from_monday: u32) -> &'static str {
    match num_days_from_monday {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        _ => "Sunday",
    }
}
