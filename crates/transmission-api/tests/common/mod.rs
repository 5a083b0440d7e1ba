//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;
use transmission_core::broadcast::Broadcaster;
use transmission_core::ids::ParticipantId;
use transmission_core::images::ImageProvider;
use transmission_core::rng::DeterministicRng;
use transmission_core::timer::Timer;
use transmission_match::application::config::MatchConfig;
use transmission_match::application::registry::SessionRegistry;
use transmission_match::application::services::MatchServices;
use transmission_test_support::{FixedClock, MockRng, StaticImageProvider, StepTimer};

use transmission_api::build_router;
use transmission_api::hub::WsHub;
use transmission_api::state::AppState;

/// The wired application plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<SessionRegistry>,
    pub hub: Arc<WsHub>,
    pub timer: Arc<StepTimer>,
}

impl TestApp {
    /// A fresh clone of the router for one request.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Opens a hub connection the way a socket would.
    pub fn connect(&self, id: &str) -> (ParticipantId, mpsc::UnboundedReceiver<String>) {
        let id = ParticipantId::new(id);
        let rx = self.hub.connect(&id);
        (id, rx)
    }
}

/// Build the full app router with the real hub, deterministic clock and RNG,
/// a stepped timer, and ten static candidate images.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        MatchConfig::default(),
        Arc::new(StaticImageProvider::with_count(10)),
    )
}

/// Build the full app with a custom match configuration and image provider.
pub fn build_test_app_with(config: MatchConfig, images: Arc<dyn ImageProvider>) -> TestApp {
    let hub = Arc::new(WsHub::new());
    let timer = Arc::new(StepTimer::new());
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(MockRng));
    let services = MatchServices {
        clock: Arc::new(FixedClock::default_instant()),
        rng,
        timer: Arc::clone(&timer) as Arc<dyn Timer>,
        broadcaster: Arc::clone(&hub) as Arc<dyn Broadcaster>,
        images,
    };
    let registry = Arc::new(SessionRegistry::new(config, services).unwrap());
    let router = build_router(AppState::new(Arc::clone(&registry), Arc::clone(&hub)));

    TestApp {
        router,
        registry,
        hub,
        timer,
    }
}

/// Collects every frame queued for a connection so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
