//! Authenticated admin API over the circuit breaker manager.

pub mod auth;
pub mod handlers;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::schema::ServiceConfig;
use crate::lifecycle::Shutdown;
use crate::resilience::manager::CircuitBreakerManager;

/// Shared state of the admin handlers. The config is swapped on reload so
/// the API key follows the file.
#[derive(Clone)]
pub struct AdminState {
    pub manager: CircuitBreakerManager,
    pub config: Arc<ArcSwap<ServiceConfig>>,
}

impl AdminState {
    pub fn new(manager: CircuitBreakerManager, config: Arc<ArcSwap<ServiceConfig>>) -> Self {
        Self { manager, config }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(list_circuits))
        .route("/admin/circuits/{name}", get(get_circuit).delete(remove_circuit))
        .route("/admin/circuits/{name}/reset", post(reset_circuit))
        .route("/admin/circuits/{name}/options", patch(update_options))
        .route("/admin/health/check", post(check_health))
        .route("/admin/metrics", get(get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Serve the admin API until `shutdown` fires.
pub async fn run_admin_server(
    listener: TcpListener,
    state: AdminState,
    shutdown: &Shutdown,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API starting");

    let mut rx = shutdown.subscribe();
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
