pub mod config;
pub mod error;
pub mod features;
pub mod index;
pub mod output;

pub use config::{Geography, ScalingMode, Settings, Weights};
pub use error::{ConfigError, InputError, Result, SchiError};
pub use features::{FeatureColumn, FeatureRow, FeatureTable};
pub use index::compute_schi;
pub use index::types::{ImputationWarning, SchiRow, SchiRun};
