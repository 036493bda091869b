use crate::config::{Endpoint, EndpointSource};
use crate::engine::band::ConfidenceBand;
use crate::engine::features::FeatureVector;
use crate::predictor::error::PredictError;
use crate::predictor::types::{HealthReport, PredictionResult};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone)]
pub struct AppState {
    pub endpoint_url: String,
    pub health_url: String,
    pub endpoint_source: EndpointSource,
    pub start_time: Instant,
    pub predict_in_flight: bool,
    pub health_in_flight: bool,
    pub requests_sent: u64,
    /// Vector from the latest accepted submission.
    pub last_vector: Option<FeatureVector>,
    pub outcome: Option<Outcome>,
    pub health: Option<HealthStatus>,
    pub banner: Option<String>,
    pub logs: VecDeque<LogEntry>,
}

/// Result of the latest submission. Replaced on every new one.
#[derive(Debug, Clone)]
pub enum Outcome {
    Prediction {
        probability: f64,
        band: ConfidenceBand,
        defaulted: bool,
        latency_ms: u64,
        response: String,
    },
    Failed {
        kind: &'static str,
        message: String,
        diagnostic: Option<String>,
    },
    InvalidInput { message: String },
}

#[derive(Debug, Clone)]
pub enum HealthStatus {
    Online { body: String },
    Failed { message: String },
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub message: String,
}

impl AppState {
    pub fn new(endpoint: &Endpoint) -> Self {
        Self {
            endpoint_url: endpoint.url.to_string(),
            health_url: endpoint.health_url().to_string(),
            endpoint_source: endpoint.source,
            start_time: Instant::now(),
            predict_in_flight: false,
            health_in_flight: false,
            requests_sent: 0,
            last_vector: None,
            outcome: None,
            health: None,
            banner: None,
            logs: VecDeque::with_capacity(MAX_LOGS),
        }
    }

    pub fn push_log(&mut self, level: &str, message: String) {
        let time = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        if self.logs.len() >= MAX_LOGS {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            time,
            level: level.to_string(),
            message,
        });
    }

    pub fn record_prediction(&mut self, result: Result<PredictionResult, PredictError>, elapsed: Duration) {
        self.predict_in_flight = false;
        match result {
            Ok(r) => {
                let band = r.band();
                self.push_log(
                    "INFO",
                    format!("win probability {:.2}% ({})", r.percent(), band.label()),
                );
                if r.defaulted {
                    self.push_log("WARN", "response had no winner_probability, showing 0%".to_string());
                }
                let response = serde_json::to_string_pretty(&r.body).unwrap_or_else(|_| r.body.to_string());
                self.outcome = Some(Outcome::Prediction {
                    probability: r.winner_probability,
                    band,
                    defaulted: r.defaulted,
                    latency_ms: elapsed.as_millis() as u64,
                    response,
                });
            }
            Err(e) => {
                self.push_log("ERROR", format!("[{}] {}", e.kind(), e));
                self.outcome = Some(Outcome::Failed {
                    kind: e.kind(),
                    message: e.user_message(),
                    diagnostic: e.diagnostic().map(|b| b.to_string()),
                });
            }
        }
    }

    pub fn record_invalid_input(&mut self, message: String) {
        self.push_log("WARN", format!("invalid input: {}", message));
        self.outcome = Some(Outcome::InvalidInput { message });
    }

    pub fn record_health(&mut self, result: Result<HealthReport, PredictError>) {
        self.health_in_flight = false;
        match result {
            Ok(report) => {
                self.push_log("INFO", format!("health check ok ({})", report.status));
                self.health = Some(HealthStatus::Online { body: report.body.to_string() });
            }
            Err(e) => {
                self.push_log("ERROR", format!("health check failed: {}", e));
                let message = match &e {
                    PredictError::Status { status, .. } => format!("API returned {}", status),
                    other => format!("Connection failed: {}", other),
                };
                self.health = Some(HealthStatus::Failed { message });
            }
        }
    }

    pub fn uptime(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        format!("{}h {:02}m", h, m)
    }
}
