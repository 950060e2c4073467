use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use super::AdminState;
use crate::config::validation::validate_options;
use crate::resilience::options::CircuitOptionsUpdate;
use crate::resilience::stats::{CircuitBreakerMetrics, CircuitBreakerStatus};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub circuits: usize,
    pub health_sweep_running: bool,
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("circuit '{name}' not found") })),
    )
        .into_response()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        circuits: state.manager.circuit_names().len(),
        health_sweep_running: state.manager.health_sweep_running(),
    })
}

pub async fn list_circuits(State(state): State<AdminState>) -> Json<Vec<CircuitBreakerStatus>> {
    Json(state.manager.get_all_statuses())
}

pub async fn get_circuit(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.manager.get_circuit_status(&name) {
        Some(status) => Json(status).into_response(),
        None => not_found(&name),
    }
}

pub async fn reset_circuit(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    if !state.manager.reset_circuit(&name) {
        return not_found(&name);
    }
    match state.manager.get_circuit_status(&name) {
        Some(status) => Json(status).into_response(),
        None => not_found(&name),
    }
}

pub async fn remove_circuit(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    if state.manager.remove_circuit(&name) {
        Json(json!({ "removed": name })).into_response()
    } else {
        not_found(&name)
    }
}

pub async fn update_options(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(update): Json<CircuitOptionsUpdate>,
) -> Response {
    let Some(mut options) = state.manager.circuit_options(&name) else {
        return not_found(&name);
    };

    update.apply(&mut options);
    let mut errors = Vec::new();
    validate_options(&format!("circuits.{name}"), &options, &mut errors);
    if !errors.is_empty() {
        let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response();
    }

    if !state.manager.update_circuit_options(&name, &update) {
        return not_found(&name);
    }
    match state.manager.get_circuit_status(&name) {
        Some(status) => Json(status).into_response(),
        None => not_found(&name),
    }
}

pub async fn check_health(State(state): State<AdminState>) -> Json<Vec<CircuitBreakerStatus>> {
    state.manager.check_all_circuits_health().await;
    Json(state.manager.get_all_statuses())
}

pub async fn get_metrics(State(state): State<AdminState>) -> Json<CircuitBreakerMetrics> {
    Json(state.manager.get_metrics())
}
