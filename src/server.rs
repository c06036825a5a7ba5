//! Read-only HTTP view of the dashboard. Every request rebuilds the bundle
//! from the store so the page never serves stale figures.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use crate::dashboard::Dashboard;
use crate::report::{self, ReportFormat};

#[derive(Clone)]
pub struct ServerState {
    pub dashboard: Arc<Dashboard>,
    pub window_days: i64,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/dashboard", get(dashboard_page))
        .with_state(state)
}

pub async fn serve(state: ServerState, port: u16) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, window_days = state.window_days, "dashboard server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_page(State(state): State<ServerState>) -> Result<Html<String>, StatusCode> {
    let bundle = state
        .dashboard
        .build(state.window_days, Utc::now())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "dashboard build failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    let page = report::render(&bundle, ReportFormat::Html).map_err(|err| {
        tracing::error!(error = %err, "dashboard render failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Html(page))
}
