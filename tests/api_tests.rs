use aqua_core::config::{AnalysisConfig, EndOfInput, ServerConfig};
use aqua_core::{BoundingBox, DetectedObject, SystemStatus};
use aqua_eye::{
    AlertThrottle, AnalysisControl, AnalysisLoop, IdentityDetector, LoopOutcome, MemorySource, NotificationReceipt,
    Notifier, RuntimeSettings, SnapshotStore, VisionError,
};
use aqua_server::{build_app, create_router, ApiState};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

// HTTP surface driven against a live analysis loop

#[derive(Default)]
struct CountingNotifier {
    sent: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _message: &str) -> Result<NotificationReceipt, VisionError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(NotificationReceipt {
            transport: self.name(),
            transport_id: None,
        })
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

struct Harness {
    router: Router,
    store: Arc<SnapshotStore>,
    settings: Arc<RuntimeSettings>,
    control: AnalysisControl,
    notifier: Arc<CountingNotifier>,
    handle: JoinHandle<LoopOutcome>,
}

/// Loop over frames whose only fish sits below the boundary. The input is
/// long enough that no restart happens while a test runs.
fn harness(alert_enabled: bool) -> Harness {
    let frames = vec![vec![DetectedObject::new(Some(1), Some("salmon"), BoundingBox::new(0.0, 40.0, 10.0, 80.0))]; 10_000];
    let store = Arc::new(SnapshotStore::new());
    let settings = Arc::new(RuntimeSettings::new(alert_enabled, true));
    let notifier = Arc::new(CountingNotifier::default());
    let throttle = AlertThrottle::new(settings.clone(), notifier.clone(), Duration::from_secs(3600));
    let config = AnalysisConfig {
        frame_stride: 1,
        end_of_input: EndOfInput::Loop,
        realtime: true,
        ..AnalysisConfig::default()
    };
    let analysis = AnalysisLoop::new(
        MemorySource::new(frames).with_frame_rate(500.0),
        IdentityDetector,
        store.clone(),
        throttle,
        config,
    );
    let control = analysis.control();

    let state = ApiState {
        store: store.clone(),
        settings: settings.clone(),
        control: control.clone(),
        stream_poll: Duration::from_millis(5),
        shutdown: watch::channel(false).1,
    };
    Harness {
        router: create_router(state),
        store,
        settings,
        control,
        notifier,
        handle: analysis.spawn(),
    }
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_snapshot_reflects_running_loop() {
    let h = harness(false);
    wait_until(|| h.store.version() >= 3).await;

    let (status, json) = get_json(&h.router, "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");
    assert_eq!(json["total_fish"], 1);
    assert_eq!(json["species"]["salmon"], 1);
    assert_eq!(json["geofence_crossed"], true);

    let (_, health) = get_json(&h.router, "/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["analysis_running"], true);

    h.control.stop();
    h.handle.await.unwrap();
}

#[tokio::test]
async fn test_stop_analysis_endpoint() {
    let h = harness(false);
    wait_until(|| h.control.stats().frames_processed > 0).await;

    let response = h
        .router
        .clone()
        .oneshot(Request::post("/stop_analysis").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let outcome = tokio::time::timeout(Duration::from_secs(5), h.handle).await.unwrap().unwrap();
    assert_eq!(outcome, LoopOutcome::Stopped);

    let (_, status) = get_json(&h.router, "/api/v1/status").await;
    assert_eq!(status["status"], "stopped");
    assert_eq!(status["analysis_running"], false);
    assert!(status["stats"]["frames_processed"].as_u64().unwrap() > 0);
    assert_eq!(h.store.status(), SystemStatus::Stopped);
}

#[tokio::test]
async fn test_enabling_alerts_at_runtime() {
    let h = harness(false);
    wait_until(|| h.control.stats().frames_processed >= 5).await;
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 0);

    let request = Request::put("/api/v1/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"alert_enabled": true}"#))
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.settings.alert_enabled());

    wait_until(|| h.control.stats().alerts_fired >= 1).await;
    // Every frame crosses, but the hour-long cooldown allows a single alert
    let processed = h.control.stats().frames_processed;
    wait_until(|| h.control.stats().frames_processed >= processed + 10).await;
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 1);
    assert_eq!(h.control.stats().alerts_fired, 1);

    h.control.stop();
    h.handle.await.unwrap();
}

#[tokio::test]
async fn test_disabling_sms_suppresses_delivery() {
    let h = harness(true);
    h.settings.set_sms_enabled(false);
    wait_until(|| h.control.stats().alerts_fired >= 1).await;

    let (_, settings) = get_json(&h.router, "/api/v1/settings").await;
    assert_eq!(settings["alert_enabled"], true);
    assert_eq!(settings["sms_enabled"], false);
    assert_eq!(h.notifier.sent.load(Ordering::SeqCst), 0);

    h.control.stop();
    h.handle.await.unwrap();
}

#[tokio::test]
async fn test_cors_layer_applied() {
    let h = harness(false);
    let state = ApiState {
        store: h.store.clone(),
        settings: h.settings.clone(),
        control: h.control.clone(),
        stream_poll: Duration::from_millis(5),
        shutdown: watch::channel(false).1,
    };
    let app = build_app(state, &ServerConfig::default());

    let request = Request::get("/")
        .header(header::ORIGIN, "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    h.control.stop();
    h.handle.await.unwrap();
}
