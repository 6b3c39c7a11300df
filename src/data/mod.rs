//! Tabular input data: typed rows, frames, and pluggable sources.

mod frame;
mod source;

pub use frame::{FeatureFrame, FeatureRow};
pub use source::{
    resolve_training_data, synthetic_frame, DataSource, FixtureSource, SyntheticSource,
};
