//! Consumer-facing surface: the liveness route, the two change-driven push
//! channels and the on-demand age endpoint.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use nokhwa::utils::CameraIndex;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    age::{self, AgeCategory},
    detect::OrtAgeClassifier,
    pipeline::camera,
    signals::SignalStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SignalStore,
    /// The age model is shared across requests; `None` when it failed to
    /// load, in which case the endpoint reports the failure per call.
    pub age_model: Arc<Mutex<Option<OrtAgeClassifier>>>,
    pub camera_index: u32,
    pub gesture_poll: Duration,
    pub color_poll: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/detect-gesture", get(gesture_ws))
        .route("/detect-clothing", get(clothing_ws))
        .route("/detect-age", get(detect_age))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn liveness() -> impl IntoResponse {
    Json(json!({ "message": "gesture-stream server is running" }))
}

async fn gesture_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let store = state.store.clone();
        stream_changes(socket, state.gesture_poll, move || store.gesture()).await;
        log::info!("gesture subscriber disconnected");
    })
}

async fn clothing_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let store = state.store.clone();
        stream_changes(socket, state.color_poll, move || store.color()).await;
        log::info!("clothing subscriber disconnected");
    })
}

/// Per-subscriber change detection: remembers the last value delivered to
/// this subscriber and reports a value only when it differs. The first
/// observation always delivers, even when it equals the store's default.
pub struct ChangeNotifier<T> {
    last_sent: Option<T>,
}

impl<T: PartialEq + Clone> ChangeNotifier<T> {
    pub fn new() -> Self {
        Self { last_sent: None }
    }

    pub fn observe(&mut self, current: T) -> Option<T> {
        if self.last_sent.as_ref() == Some(&current) {
            return None;
        }
        self.last_sent = Some(current.clone());
        Some(current)
    }
}

impl<T: PartialEq + Clone> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the store on this subscriber's cadence and pushes on change.
/// A send failure or a close frame ends only this subscriber's loop.
async fn stream_changes<T, F>(mut socket: WebSocket, poll: Duration, read: F)
where
    T: PartialEq + Clone + ToString,
    F: Fn() -> T,
{
    let mut notifier = ChangeNotifier::new();
    loop {
        if let Some(update) = notifier.observe(read()) {
            if socket.send(Message::Text(update.to_string())).await.is_err() {
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            incoming = socket.recv() => match incoming {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn detect_age(State(state): State<AppState>) -> impl IntoResponse {
    let index = CameraIndex::Index(state.camera_index);
    let model = state.age_model.clone();

    // One independent capture handle plus a model forward pass, all blocking;
    // keep it off the runtime workers.
    let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<AgeCategory> {
        let frame = camera::capture_single_frame(index)?;
        let mut guard = model.lock().expect("age model lock poisoned");
        let classifier = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("age model not loaded"))?;
        let bracket = classifier.classify(&frame)?;
        Ok(age::bucket(bracket))
    })
    .await;

    match outcome {
        Ok(Ok(category)) => (
            StatusCode::OK,
            Json(json!({ "category": category.as_str() })),
        ),
        Ok(Err(err)) => {
            log::warn!("age classification failed: {err:?}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
        }
        Err(err) => {
            log::error!("age classification task panicked: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorEstimate, GestureLabel};

    #[test]
    fn first_observation_always_delivers() {
        let mut notifier = ChangeNotifier::new();
        // Even the store's initial default goes out on the first poll.
        assert_eq!(
            notifier.observe(GestureLabel::Waiting),
            Some(GestureLabel::Waiting)
        );
    }

    #[test]
    fn unchanged_value_is_not_redelivered() {
        let mut notifier = ChangeNotifier::new();
        assert!(notifier.observe(ColorEstimate::Unknown).is_some());
        assert!(notifier.observe(ColorEstimate::Unknown).is_none());
        assert!(notifier.observe(ColorEstimate::Unknown).is_none());
    }

    #[test]
    fn change_is_delivered_and_becomes_the_new_baseline() {
        let mut notifier = ChangeNotifier::new();
        notifier.observe(GestureLabel::Waiting);
        assert_eq!(
            notifier.observe(GestureLabel::ThumbsUp),
            Some(GestureLabel::ThumbsUp)
        );
        assert!(notifier.observe(GestureLabel::ThumbsUp).is_none());
        // Flapping back still counts as a change.
        assert_eq!(
            notifier.observe(GestureLabel::Waiting),
            Some(GestureLabel::Waiting)
        );
    }

    #[test]
    fn notifiers_track_subscribers_independently() {
        let mut first = ChangeNotifier::new();
        let mut second = ChangeNotifier::new();
        first.observe(GestureLabel::LeftHand);
        // A fresh subscriber still gets the current value.
        assert_eq!(
            second.observe(GestureLabel::LeftHand),
            Some(GestureLabel::LeftHand)
        );
    }

    #[test]
    fn intermediate_values_between_polls_are_coalesced() {
        let mut notifier = ChangeNotifier::new();
        notifier.observe(GestureLabel::Waiting);
        // The store moved Waiting -> ThumbsUp -> Waiting between polls; the
        // subscriber only ever sees what is current at poll time.
        assert!(notifier.observe(GestureLabel::Waiting).is_none());
    }
}
