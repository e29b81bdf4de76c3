use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::github::RepositoryRef;
use crate::output::{HtmlGenerator, OutputGenerator};
use crate::ranking::{Collector, ContributorsPage};

pub struct AppState {
    collector: Collector,
    repositories: Vec<RepositoryRef>,
    html: HtmlGenerator,
}

impl AppState {
    pub fn new(collector: Collector, repositories: Vec<RepositoryRef>) -> Result<Self> {
        Ok(Self {
            collector,
            repositories,
            html: HtmlGenerator::new()?,
        })
    }

    async fn collect(&self) -> ContributorsPage {
        self.collector.collect(&self.repositories).await
    }
}

/// Application errors surface as a plain-text 500.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render page: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(contributors_page))
        .route("/api/contributors", get(contributors_json))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(bind: &str, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    info!(
        "Serving {} repositories at http://{}",
        state.repositories.len(),
        local_addr
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn contributors_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let page = state.collect().await;
    let html = state.html.generate(&page)?;
    Ok(Html(html))
}

async fn contributors_json(State(state): State<Arc<AppState>>) -> Json<ContributorsPage> {
    Json(state.collect().await)
}

async fn health() -> &'static str {
    "ok"
}
