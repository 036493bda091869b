use super::error::PredictError;
use super::types::*;
use super::PredictionBackend;
use crate::config::{ApiConfig, Endpoint, MissingProbability};
use crate::engine::features::FeatureVector;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const PROBABILITY_KEY: &str = "winner_probability";

pub struct PredictionClient {
    client: Client,
    endpoint: Endpoint,
    request_timeout: Duration,
    health_timeout: Duration,
    missing_probability: MissingProbability,
}

impl PredictionClient {
    pub fn new(endpoint: Endpoint, api: &ApiConfig) -> Result<Self, PredictError> {
        let client = Client::builder()
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| PredictError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            request_timeout: api.request_timeout(),
            health_timeout: api.health_timeout(),
            missing_probability: api.missing_probability,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl PredictionBackend for PredictionClient {
    async fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, PredictError> {
        let url = self.endpoint.url.as_str();
        let timeout = self.request_timeout;
        let body = PredictRequest { features: features.as_slice() };

        tracing::debug!(url, count = features.len(), "POST predict");
        let resp = self
            .client
            .post(self.endpoint.url.clone())
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PredictError::from_transport(e, url, timeout))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| PredictError::from_transport(e, url, timeout))?;

        if status != StatusCode::OK {
            return Err(PredictError::Status {
                status: status.as_u16(),
                body: ResponseBody::from_text(text),
            });
        }

        parse_prediction(&text, self.missing_probability)
    }

    async fn health(&self) -> Result<HealthReport, PredictError> {
        let url = self.endpoint.health_url();
        let timeout = self.health_timeout;

        tracing::debug!(url = %url, "GET health");
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PredictError::from_transport(e, url.as_str(), timeout))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| PredictError::from_transport(e, url.as_str(), timeout))?;
        let body = ResponseBody::from_text(text);

        if status != StatusCode::OK {
            return Err(PredictError::Status { status: status.as_u16(), body });
        }
        Ok(HealthReport { status: status.as_u16(), body })
    }
}

/// Parse a 200 body into a result.
pub fn parse_prediction(
    text: &str,
    missing: MissingProbability,
) -> Result<PredictionResult, PredictError> {
    let body: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return Err(PredictError::malformed(
                format!("body is not valid JSON ({})", e),
                Some(ResponseBody::Text(text.to_string())),
            ));
        }
    };

    if !body.is_object() {
        return Err(PredictError::malformed(
            "expected a JSON object",
            Some(ResponseBody::Json(body)),
        ));
    }

    let (winner_probability, defaulted) = match body.get(PROBABILITY_KEY) {
        None | Some(serde_json::Value::Null) => match missing {
            MissingProbability::DefaultZero => {
                tracing::warn!("response has no {}, assuming 0.0", PROBABILITY_KEY);
                (0.0, true)
            }
            MissingProbability::Error => {
                return Err(PredictError::malformed(
                    format!("missing {}", PROBABILITY_KEY),
                    Some(ResponseBody::Json(body)),
                ));
            }
        },
        Some(value) => {
            let Some(p) = value.as_f64() else {
                let reason = format!("{} is not a number: {}", PROBABILITY_KEY, value);
                return Err(PredictError::malformed(reason, Some(ResponseBody::Json(body))));
            };
            if !(0.0..=1.0).contains(&p) {
                return Err(PredictError::malformed(
                    format!("{} out of range [0, 1]: {}", PROBABILITY_KEY, p),
                    Some(ResponseBody::Json(body)),
                ));
            }
            (p, false)
        }
    };

    Ok(PredictionResult { winner_probability, defaulted, body })
}
