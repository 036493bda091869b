pub mod client;
pub mod error;
pub mod types;

use crate::engine::features::FeatureVector;
use async_trait::async_trait;
use error::PredictError;
use types::{HealthReport, PredictionResult};

pub use client::PredictionClient;

#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, PredictError>;
    async fn health(&self) -> Result<HealthReport, PredictError>;
}
