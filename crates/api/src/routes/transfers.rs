//! Transfer trigger endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::RunId;
use saga::{ActivityGateway, TransferOrchestrator, TransferRequest};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<G> {
    pub orchestrator: Arc<TransferOrchestrator<G>>,
}

#[derive(Serialize)]
pub struct TransferResponse {
    pub message: String,
    pub run_id: String,
}

/// POST /transfer — run a transfer saga and wait for its outcome.
///
/// The saga runs on its own task, so a client that disconnects does not
/// cancel it halfway.
#[tracing::instrument(skip(state, req))]
pub async fn create<G: ActivityGateway + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let result = run_transfer(&state, req).await;
    let status = match &result {
        Ok(_) => "completed",
        Err(ApiError::BadRequest(_)) => "rejected",
        Err(_) => "failed",
    };
    metrics::counter!("transfer_requests_total", "status" => status).increment(1);
    result
}

async fn run_transfer<G: ActivityGateway + 'static>(
    state: &AppState<G>,
    req: TransferRequest,
) -> Result<Json<TransferResponse>, ApiError> {
    if req.origin.is_empty() {
        return Err(ApiError::BadRequest("origin must not be empty".to_string()));
    }
    if req.destination.is_empty() {
        return Err(ApiError::BadRequest(
            "destination must not be empty".to_string(),
        ));
    }

    let run_id = RunId::new();
    tracing::info!(
        %run_id,
        origin = %req.origin,
        destination = %req.destination,
        amount = req.amount,
        "starting transfer"
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let run = tokio::spawn(async move { orchestrator.run_with_id(run_id, req).await })
        .await
        .map_err(|e| ApiError::Internal(format!("failed to obtain orchestration result: {e}")))?;

    run.outcome
        .into_result()
        .map_err(|error| ApiError::Transfer { run_id, error })?;

    Ok(Json(TransferResponse {
        message: "Transfer completed successfully".to_string(),
        run_id: run_id.to_string(),
    }))
}
