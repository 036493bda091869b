use crate::engine::band::ConfidenceBand;
use serde::Serialize;
use std::fmt;

/// POST body for the predict endpoint.
#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub features: &'a [f64],
}

/// A response body kept for display: JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Json(_) => false,
            ResponseBody::Text(t) => t.trim().is_empty(),
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Json(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            ResponseBody::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub winner_probability: f64,
    /// True when the backend omitted `winner_probability` and 0.0 was assumed.
    pub defaulted: bool,
    /// Full response, other fields included.
    pub body: serde_json::Value,
}

impl PredictionResult {
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::classify(self.winner_probability)
    }

    pub fn percent(&self) -> f64 {
        self.winner_probability * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: u16,
    pub body: ResponseBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_as_features_array() {
        let values = [1.0, 2.5, 0.0];
        let body = serde_json::to_value(PredictRequest { features: &values }).unwrap();
        assert_eq!(body, json!({ "features": [1.0, 2.5, 0.0] }));
    }

    #[test]
    fn test_body_json_or_text() {
        assert_eq!(
            ResponseBody::from_text(r#"{"detail":"bad"}"#.to_string()),
            ResponseBody::Json(json!({ "detail": "bad" }))
        );
        assert_eq!(
            ResponseBody::from_text("Internal Server Error".to_string()),
            ResponseBody::Text("Internal Server Error".to_string())
        );
    }

    #[test]
    fn test_body_display_pretty_prints_json() {
        let body = ResponseBody::Json(json!({ "status": "ok" }));
        assert_eq!(body.to_string(), "{\n  \"status\": \"ok\"\n}");
    }

    #[test]
    fn test_result_band() {
        let r = PredictionResult {
            winner_probability: 0.4,
            defaulted: false,
            body: json!({}),
        };
        assert_eq!(r.band(), ConfidenceBand::Winner);
        assert!((r.percent() - 40.0).abs() < 1e-9);
    }
}
