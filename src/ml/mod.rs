//! Feature engineering, training and forecasting.
//!
//! Nothing in this module performs network or database I/O; the artifact
//! store is the only part that touches the filesystem.

pub mod artifact;
pub mod error;
pub mod features;
pub mod forecast;
pub mod linear;
pub mod metrics;
pub mod predict;
pub mod scaler;
pub mod split;
pub mod trainer;

pub use artifact::{ArtifactStore, ModelArtifact, ModelSet};
pub use error::ModelError;
pub use features::{FeatureBuilder, FeatureRow, Observations};
pub use forecast::{forecast, Aggregation, HOURS_PER_DAY};
pub use predict::{predict, predict_all};
pub use trainer::{ModelTrainer, TargetSummary, TrainingReport, TrainingRun, TrainingTable};
