//! REST endpoints for the governance core.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::error::{DispatchError, PluginError};
use crate::governance::Orchestrator;
use crate::plugins::{DispatchOutcome, PluginDispatcher, PluginMessage};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Arc<PluginDispatcher>,
}

/// Build the Axum router with governance and plugin routes.
pub fn governance_routes(orchestrator: Arc<Orchestrator>, dispatcher: Arc<PluginDispatcher>) -> Router {
    let state = AppState {
        orchestrator,
        dispatcher,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/cycle", post(run_cycle))
        .route("/api/state", get(current_state))
        .route("/api/state/latest", get(latest_state))
        .route("/api/trust/history", get(trust_history))
        .route("/api/capabilities", get(list_capabilities))
        .route("/api/plugins/{name}/dispatch", post(dispatch_plugin))
        .route("/api/analysis", post(analyze_message))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "tuda-governance"
    }))
}

// ── Governance ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CycleRequest {
    #[serde(default)]
    context: String,
    feedback: Option<String>,
}

async fn run_cycle(State(state): State<AppState>, Json(body): Json<CycleRequest>) -> impl IntoResponse {
    match state
        .orchestrator
        .run_cycle_detailed(&body.context, body.feedback.as_deref())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => {
            error!(error = %e, "Governance cycle failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

async fn current_state(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.orchestrator.snapshot().await;
    Json(json!(snapshot))
}

async fn latest_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.store().load_latest().await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No snapshot persisted yet"})),
        ),
        Err(e) => {
            error!(error = %e, "Failed to load latest snapshot");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

async fn trust_history(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.orchestrator.ledger();
    Json(json!({
        "score": ledger.score(),
        "events": ledger.history(),
    }))
}

// ── Plugins ─────────────────────────────────────────────────────────────

async fn list_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    let capabilities = state.orchestrator.capabilities();
    let listing: Vec<Value> = state
        .dispatcher
        .plugins()
        .iter()
        .filter_map(|plugin| {
            let capability = capabilities.get(plugin.name())?;
            Some(json!({
                "name": capability.name,
                "description": plugin.description(),
                "enabled": capability.enabled,
                "requires_trust": capability.requires_trust,
                "requires_explicit_opt_in": capability.requires_explicit_opt_in,
            }))
        })
        .collect();
    Json(listing)
}

async fn dispatch_plugin(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(message): Json<PluginMessage>,
) -> impl IntoResponse {
    let snapshot = state.orchestrator.snapshot().await;
    match state.dispatcher.dispatch(&name, &snapshot, &message).await {
        Ok(outcome) => (outcome_status(&outcome), Json(json!(outcome))),
        Err(e) => {
            let (status, body) = error_body(&e);
            (status, Json(body))
        }
    }
}

async fn analyze_message(
    State(state): State<AppState>,
    Json(message): Json<PluginMessage>,
) -> impl IntoResponse {
    let snapshot = state.orchestrator.snapshot().await;
    let results = state.dispatcher.dispatch_all(&snapshot, &message).await;

    let mut report = serde_json::Map::new();
    for (name, result) in results {
        let entry = match result {
            Ok(outcome) => json!(outcome),
            Err(e) => error_body(&e).1,
        };
        report.insert(name, entry);
    }

    Json(json!({
        "trust_level": snapshot.trust_level,
        "thermal_state": snapshot.thermal_state,
        "inference_mode": snapshot.inference_mode,
        "results": report,
    }))
}

fn outcome_status(outcome: &DispatchOutcome) -> StatusCode {
    match outcome {
        DispatchOutcome::Completed { .. } => StatusCode::OK,
        DispatchOutcome::Deferred { .. } => StatusCode::ACCEPTED,
    }
}

fn error_body(e: &DispatchError) -> (StatusCode, Value) {
    match e {
        DispatchError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({"status": "not_found", "error": e.to_string()}),
        ),
        DispatchError::PermissionDenied {
            required, current, ..
        } => (
            StatusCode::FORBIDDEN,
            json!({
                "status": "denied",
                "error": e.to_string(),
                "required": required,
                "current": current,
            }),
        ),
        DispatchError::Disabled { .. } => (
            StatusCode::CONFLICT,
            json!({"status": "disabled", "error": e.to_string()}),
        ),
        DispatchError::Plugin(PluginError::InvalidMessage { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"status": "invalid_message", "error": e.to_string()}),
        ),
        DispatchError::Plugin(PluginError::ExecutionFailed { .. }) => {
            warn!(error = %e, "Plugin execution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "failed", "error": e.to_string()}),
            )
        }
    }
}
