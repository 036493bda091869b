pub mod band;
pub mod features;

pub use band::ConfidenceBand;
pub use features::{derive, FeatureDeriver, FeatureError, FeatureVector, RawInputs, TimeDiffMode};
