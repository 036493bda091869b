// Turns dashboard commands into derivations and backend calls.

use crate::engine::features::{FeatureDeriver, RawInputs};
use crate::predictor::error::PredictError;
use crate::predictor::PredictionBackend;
use crate::tui::state::AppState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What happened to a submission.
#[derive(Debug)]
pub enum Submission {
    /// Request is running on the returned task.
    Started(JoinHandle<()>),
    /// Another request of the same kind is still pending; nothing was sent.
    Busy,
    /// Inputs failed validation; nothing was sent.
    Rejected,
}

pub struct Controller {
    backend: Arc<dyn PredictionBackend>,
    deriver: FeatureDeriver,
    state_tx: watch::Sender<AppState>,
}

impl Controller {
    pub fn new(
        backend: Arc<dyn PredictionBackend>,
        deriver: FeatureDeriver,
        state_tx: watch::Sender<AppState>,
    ) -> Self {
        Self { backend, deriver, state_tx }
    }

    pub fn deriver(&self) -> &FeatureDeriver {
        &self.deriver
    }

    /// Derive from a snapshot of the form and, if valid, send it.
    pub fn submit(&self, raw: RawInputs) -> Submission {
        if self.state_tx.borrow().predict_in_flight {
            tracing::warn!("prediction already in flight, ignoring submission");
            self.state_tx.send_modify(|s| {
                s.push_log("WARN", "prediction already in flight".to_string());
            });
            return Submission::Busy;
        }

        let vector = match self.deriver.derive(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "rejected inputs");
                self.state_tx.send_modify(|s| s.record_invalid_input(e.to_string()));
                return Submission::Rejected;
            }
        };

        self.state_tx.send_modify(|s| {
            s.predict_in_flight = true;
            s.requests_sent += 1;
            s.last_vector = Some(vector);
            // The previous result belongs to the previous vector.
            s.outcome = None;
            s.push_log("INFO", format!("sending {} features", vector.len()));
        });

        let backend = self.backend.clone();
        let state_tx = self.state_tx.clone();
        let request = tokio::spawn(async move {
            let started = Instant::now();
            let result = backend.predict(&vector).await;
            (result, started.elapsed())
        });
        let handle = tokio::spawn(async move {
            let (result, elapsed) = match request.await {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "prediction task aborted");
                    let err = PredictError::Request(format!("prediction task aborted: {}", e));
                    (Err(err), Duration::ZERO)
                }
            };
            match &result {
                Ok(r) => tracing::info!(
                    probability = r.winner_probability,
                    band = r.band().label(),
                    latency_ms = elapsed.as_millis() as u64,
                    "prediction received"
                ),
                Err(e) => tracing::warn!(kind = e.kind(), error = %e, "prediction failed"),
            }
            state_tx.send_modify(|s| s.record_prediction(result, elapsed));
        });
        Submission::Started(handle)
    }

    pub fn check_health(&self) -> Submission {
        if self.state_tx.borrow().health_in_flight {
            tracing::warn!("health check already in flight, ignoring request");
            self.state_tx.send_modify(|s| {
                s.push_log("WARN", "health check already in flight".to_string());
            });
            return Submission::Busy;
        }
        self.state_tx.send_modify(|s| {
            s.health_in_flight = true;
            s.push_log("INFO", format!("testing {}", s.health_url));
        });

        let backend = self.backend.clone();
        let state_tx = self.state_tx.clone();
        let request = tokio::spawn(async move { backend.health().await });
        let handle = tokio::spawn(async move {
            let result = request.await.unwrap_or_else(|e| {
                Err(PredictError::Request(format!("health task aborted: {}", e)))
            });
            if let Err(e) = &result {
                tracing::warn!(error = %e, "health check failed");
            }
            state_tx.send_modify(|s| s.record_health(result));
        });
        Submission::Started(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve_endpoint;
    use crate::engine::features::{FeatureVector, TimeDiffMode};
    use crate::predictor::types::{HealthReport, PredictionResult};
    use crate::tui::state::{HealthStatus, Outcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Holds every prediction until `release` is notified.
    struct GatedBackend {
        release: Notify,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<f64>>>,
        probability: f64,
    }

    impl GatedBackend {
        fn new(probability: f64) -> Arc<Self> {
            Arc::new(Self {
                release: Notify::new(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                probability,
            })
        }
    }

    #[async_trait]
    impl PredictionBackend for GatedBackend {
        async fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, PredictError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(features.as_slice().to_vec());
            self.release.notified().await;
            Ok(PredictionResult {
                winner_probability: self.probability,
                defaulted: false,
                body: serde_json::json!({ "winner_probability": self.probability }),
            })
        }

        async fn health(&self) -> Result<HealthReport, PredictError> {
            Err(PredictError::Connection {
                url: "http://127.0.0.1:1/health".to_string(),
                reason: "refused".to_string(),
            })
        }
    }

    fn controller(backend: Arc<GatedBackend>, deriver: FeatureDeriver) -> (Controller, watch::Receiver<AppState>) {
        let (ep, _) = resolve_endpoint(Some("http://127.0.0.1:1/predict"), None);
        let (tx, rx) = watch::channel(AppState::new(&ep));
        (Controller::new(backend, deriver, tx), rx)
    }

    #[tokio::test]
    async fn test_second_submission_while_in_flight_is_refused() {
        let backend = GatedBackend::new(0.5);
        let (ctl, rx) = controller(backend.clone(), FeatureDeriver::default());

        let Submission::Started(handle) = ctl.submit(RawInputs::default()) else {
            panic!("first submission should start");
        };
        assert!(rx.borrow().predict_in_flight);
        assert!(matches!(ctl.submit(RawInputs::default()), Submission::Busy));

        // Let the spawned task reach the gate before releasing it.
        while backend.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        backend.release.notify_one();
        handle.await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let state = rx.borrow();
        assert!(!state.predict_in_flight);
        assert_eq!(state.requests_sent, 1);
        assert!(matches!(
            state.outcome,
            Some(Outcome::Prediction { band: crate::engine::ConfidenceBand::Winner, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_backend() {
        let backend = GatedBackend::new(0.5);
        let (ctl, rx) = controller(backend.clone(), FeatureDeriver::default());

        let raw = RawInputs { grid_position: 0, ..RawInputs::default() };
        assert!(matches!(ctl.submit(raw), Submission::Rejected));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let state = rx.borrow();
        assert!(!state.predict_in_flight);
        assert!(state.last_vector.is_none());
        assert!(matches!(
            &state.outcome,
            Some(Outcome::InvalidInput { message }) if message.contains("GridPosition")
        ));
    }

    #[tokio::test]
    async fn test_submission_uses_configured_deriver() {
        let backend = GatedBackend::new(0.1);
        let deriver = FeatureDeriver::new(TimeDiffMode::Auto { reference_lap_s: 79.4 });
        let (ctl, _rx) = controller(backend.clone(), deriver);

        let Submission::Started(handle) = ctl.submit(RawInputs::default()) else {
            panic!("submission should start");
        };
        while backend.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        backend.release.notify_one();
        handle.await.unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 20);
        assert!((seen[0][15] - 0.5).abs() < 1e-9, "got {}", seen[0][15]);
    }

    #[tokio::test]
    async fn test_health_failure_is_recorded() {
        let backend = GatedBackend::new(0.5);
        let (ctl, rx) = controller(backend, FeatureDeriver::default());

        let Submission::Started(handle) = ctl.check_health() else {
            panic!("health check should start");
        };
        handle.await.unwrap();
        let state = rx.borrow();
        assert!(!state.health_in_flight);
        assert!(matches!(state.health, Some(HealthStatus::Failed { .. })));
    }

    async fn release_next(backend: &GatedBackend, seen_calls: usize) {
        while backend.calls.load(Ordering::SeqCst) == seen_calls {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        backend.release.notify_one();
    }

    #[tokio::test]
    async fn test_new_submission_clears_previous_outcome() {
        let backend = GatedBackend::new(0.9);
        let (ctl, rx) = controller(backend.clone(), FeatureDeriver::default());

        let Submission::Started(first) = ctl.submit(RawInputs::default()) else {
            panic!("first submission should start");
        };
        release_next(&backend, 0).await;
        first.await.unwrap();
        assert!(matches!(rx.borrow().outcome, Some(Outcome::Prediction { .. })));

        let raw = RawInputs { grid_position: 18, ..RawInputs::default() };
        let Submission::Started(second) = ctl.submit(raw) else {
            panic!("second submission should start");
        };
        {
            let state = rx.borrow();
            assert!(state.predict_in_flight);
            assert_eq!(state.last_vector.and_then(|v| v.get("GridPosition")), Some(18.0));
            assert!(state.outcome.is_none(), "old result still shown: {:?}", state.outcome);
        }

        release_next(&backend, 1).await;
        second.await.unwrap();
        assert!(matches!(rx.borrow().outcome, Some(Outcome::Prediction { .. })));
    }

    #[tokio::test]
    async fn test_second_health_check_while_in_flight_is_refused_and_logged() {
        let backend = GatedBackend::new(0.5);
        let (ctl, rx) = controller(backend, FeatureDeriver::default());

        let Submission::Started(handle) = ctl.check_health() else {
            panic!("health check should start");
        };
        assert!(matches!(ctl.check_health(), Submission::Busy));
        assert!(rx
            .borrow()
            .logs
            .iter()
            .any(|l| l.level == "WARN" && l.message.contains("health check already in flight")));
        handle.await.unwrap();
    }

    struct PanickingBackend;

    #[async_trait]
    impl PredictionBackend for PanickingBackend {
        async fn predict(&self, _features: &FeatureVector) -> Result<PredictionResult, PredictError> {
            panic!("backend blew up");
        }

        async fn health(&self) -> Result<HealthReport, PredictError> {
            panic!("backend blew up");
        }
    }

    #[tokio::test]
    async fn test_panicking_request_releases_in_flight_flags() {
        let (ep, _) = resolve_endpoint(Some("http://127.0.0.1:1/predict"), None);
        let (tx, rx) = watch::channel(AppState::new(&ep));
        let ctl = Controller::new(Arc::new(PanickingBackend), FeatureDeriver::default(), tx);

        let Submission::Started(handle) = ctl.submit(RawInputs::default()) else {
            panic!("submission should start");
        };
        handle.await.unwrap();
        {
            let state = rx.borrow();
            assert!(!state.predict_in_flight);
            assert!(matches!(&state.outcome, Some(Outcome::Failed { kind: "REQUEST", .. })));
        }
        assert!(matches!(ctl.submit(RawInputs::default()), Submission::Started(_)));

        let Submission::Started(handle) = ctl.check_health() else {
            panic!("health check should start");
        };
        handle.await.unwrap();
        assert!(!rx.borrow().health_in_flight);
        assert!(matches!(rx.borrow().health, Some(HealthStatus::Failed { .. })));
    }
}
