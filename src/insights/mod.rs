//! Derived insights on top of trained models and historical rows: skill
//! scores, influencer clusters, and posting-schedule aggregates.

pub mod cluster;
pub mod schedule;
pub mod skill;

pub use cluster::{cluster_influencers, ClusterAssignment, KMeans};
pub use schedule::{suggest_posting_schedule, DaySlot, HourSlot, ScheduleReport};
pub use skill::{estimate_influencer_skill, SkillScoreRecord};
