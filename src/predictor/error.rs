use super::types::ResponseBody;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the prediction backend. None of these are retried.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },
    #[error("no response from {url} within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("backend returned status {status}")]
    Status { status: u16, body: ResponseBody },
    #[error("malformed response: {reason}")]
    MalformedResponse {
        reason: String,
        body: Option<ResponseBody>,
    },
    #[error("request failed: {0}")]
    Request(String),
}

impl PredictError {
    pub fn malformed(reason: impl Into<String>, body: Option<ResponseBody>) -> Self {
        PredictError::MalformedResponse { reason: reason.into(), body }
    }

    /// Map a transport error from reqwest onto our taxonomy.
    pub fn from_transport(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            PredictError::Timeout { url: url.to_string(), timeout }
        } else if err.is_connect() {
            PredictError::Connection {
                url: url.to_string(),
                reason: root_cause(&err),
            }
        } else {
            PredictError::Request(root_cause(&err))
        }
    }

    /// Short tag for log lines and the result panel title.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Connection { .. } => "CONNECTION",
            PredictError::Timeout { .. } => "TIMEOUT",
            PredictError::Status { .. } => "STATUS",
            PredictError::MalformedResponse { .. } => "MALFORMED",
            PredictError::Request(_) => "REQUEST",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PredictError::Timeout { timeout, .. } => format!(
                "Request timeout! The API did not respond within {} seconds.",
                timeout.as_secs_f64()
            ),
            PredictError::Connection { url, .. } => format!(
                "Connection error! Could not reach the API at {}. Check that the backend is running.",
                url
            ),
            PredictError::Status { status, .. } => format!("API error: status code {}", status),
            PredictError::MalformedResponse { reason, .. } => {
                format!("Invalid response from API: {}", reason)
            }
            PredictError::Request(reason) => format!("Request failed: {}", reason),
        }
    }

    /// Body worth showing beneath the message, if any.
    pub fn diagnostic(&self) -> Option<&ResponseBody> {
        match self {
            PredictError::Status { body, .. } if !body.is_empty() => Some(body),
            PredictError::MalformedResponse { body: Some(body), .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut cur = err;
    while let Some(next) = cur.source() {
        cur = next;
    }
    cur.to_string()
}
