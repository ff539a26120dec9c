// Server-Sent Events endpoint streaming snapshot changes

use crate::http::ApiState;
use aqua_core::Snapshot;
use aqua_eye::ChangeStream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::watch;
use tracing::{debug, warn};

/// One `data:` event per advanced version, tagged with the version as the
/// event id. Each connection polls the store on its own schedule and ends
/// when the server shuts down.
pub async fn analyze_stream_handler(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Stream consumer connected");
    let events = ChangeStream::new(state.store.clone(), state.stream_poll)
        .into_stream()
        .map(|snapshot| Ok(snapshot_event(&snapshot)))
        .take_until(shutdown_requested(state.shutdown.clone()));

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender means no shutdown will ever be signalled
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn snapshot_event(snapshot: &Snapshot) -> Event {
    let event = Event::default().id(snapshot.version.to_string());
    match event.json_data(snapshot) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to encode snapshot {}: {}", snapshot.version, e);
            Event::default().comment("encoding error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::create_router;
    use aqua_core::config::AnalysisConfig;
    use aqua_core::SystemStatus;
    use aqua_eye::{
        AlertThrottle, AnalysisLoop, IdentityDetector, LogNotifier, MemorySource, RuntimeSettings, SnapshotStore,
    };
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> ApiState {
        let store = Arc::new(SnapshotStore::new());
        let settings = Arc::new(RuntimeSettings::default());
        let throttle = AlertThrottle::new(settings.clone(), Arc::new(LogNotifier), Duration::from_secs(60));
        let analysis = AnalysisLoop::new(
            MemorySource::new(Vec::new()),
            IdentityDetector,
            store.clone(),
            throttle,
            AnalysisConfig::default(),
        );
        ApiState {
            store,
            settings,
            control: analysis.control(),
            stream_poll: Duration::from_millis(10),
            shutdown: watch::channel(false).1,
        }
    }

    #[tokio::test]
    async fn test_stream_content_type_and_first_event() {
        let state = state();
        let mut snapshot = Snapshot::empty(SystemStatus::Running);
        snapshot.total_active = 2;
        state.store.publish(snapshot);

        let response = create_router(state)
            .oneshot(Request::get("/analyze_stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream")));

        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("id: 1"));
        assert!(text.contains("\"total_fish\":2"));
    }

    #[tokio::test]
    async fn test_stream_ends_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = ApiState {
            shutdown: shutdown_rx,
            ..state()
        };

        let response = create_router(state)
            .oneshot(Request::get("/analyze_stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();
        assert!(body.next().await.is_some());

        shutdown_tx.send(true).unwrap();
        let rest = tokio::time::timeout(Duration::from_secs(5), async {
            while body.next().await.is_some() {}
        })
        .await;
        assert!(rest.is_ok());
    }
}
