//! HTTP entrypoint for the transfer saga.
//!
//! Each `POST /transfer` runs one orchestration and blocks until it
//! finishes. Structured logging via tracing, Prometheus metrics on
//! `/metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    ActivityGateway, OptionsError, RetryingGateway, RiskPolicy, SimulatedActivities,
    TransferOrchestrator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::transfers::AppState;

/// Gateway used by the server: simulated activities behind retry and timeouts.
pub type DefaultGateway = RetryingGateway<SimulatedActivities>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<G: ActivityGateway + 'static>(
    state: Arc<AppState<G>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/transfer", post(routes::transfers::create::<G>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around any gateway.
pub fn create_state<G: ActivityGateway + 'static>(
    gateway: Arc<G>,
    risk_policy: RiskPolicy,
) -> Arc<AppState<G>> {
    let orchestrator = TransferOrchestrator::new(gateway).with_risk_policy(risk_policy);
    Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
    })
}

/// Creates the default application state with simulated activities.
pub fn create_default_state(config: &Config) -> Result<Arc<AppState<DefaultGateway>>, OptionsError> {
    let options = config.activity_options()?;
    let gateway = RetryingGateway::new(SimulatedActivities::new(), options)
        .with_max_concurrency(config.activity_max_concurrency);
    Ok(create_state(Arc::new(gateway), config.risk_policy))
}
