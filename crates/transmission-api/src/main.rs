//! Transmission API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use transmission_api::config::ServerConfig;
use transmission_api::hub::WsHub;
use transmission_api::images::GoogleImageSearch;
use transmission_api::state::AppState;
use transmission_api::{build_router, sweeper, telemetry};
use transmission_core::broadcast::Broadcaster;
use transmission_core::clock::SystemClock;
use transmission_core::rng::{DeterministicRng, OsSeededRng};
use transmission_core::timer::TokioTimer;
use transmission_match::application::registry::SessionRegistry;
use transmission_match::application::services::MatchServices;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Read configuration from environment.
    let config = ServerConfig::from_env()?;

    // Initialize tracing subscriber.
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Transmission API server");

    // Wire the match engine to the WebSocket hub and the image search.
    let hub = Arc::new(WsHub::new());
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(OsSeededRng::new()));
    let services = MatchServices {
        clock: Arc::new(SystemClock),
        rng,
        timer: Arc::new(TokioTimer),
        broadcaster: Arc::clone(&hub) as Arc<dyn Broadcaster>,
        images: Arc::new(GoogleImageSearch::new(config.google.clone())),
    };
    let registry = Arc::new(SessionRegistry::new(config.match_config.clone(), services)?);

    let sweeper = tokio::spawn(sweeper::run(
        Arc::clone(&registry),
        sweeper::SweepPolicy {
            retention: config.session_retention,
            lobby_ttl: config.lobby_ttl,
            interval: config.sweep_interval,
        },
    ));

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = build_router(AppState::new(Arc::clone(&registry), hub))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    sweeper.abort();
    registry.shutdown();
    telemetry::shutdown(tracer_provider);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
