//! HTTP surface: `GET /` runs the pipeline, `POST /` logs the body.
use crate::pipeline::{Pipeline, PipelineError};

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        log::error!("request failed: {}", self);
        // Script stderr and sql errors stay in the log.
        let body = match &self {
            PipelineError::Subprocess(_) => "Script failed",
            PipelineError::Parse(_) => "Script output could not be parsed",
            PipelineError::Persistence(_) => "Storage error",
        };
        (self.status_code(), body).into_response()
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .with_state(pipeline)
}

pub async fn index(State(pipeline): State<Arc<Pipeline>>) -> Result<Html<String>, PipelineError> {
    let view = pipeline.run().await?;
    Ok(Html(view.render()))
}

/// Accepts any body. Nothing is done with it besides logging.
pub async fn submit(headers: HeaderMap, body: Bytes) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    log::info!(
        "POST / ({}, {} bytes): {}",
        content_type,
        body.len(),
        String::from_utf8_lossy(&body)
    );
    StatusCode::NO_CONTENT
}

/// Serve until ctrl-c.
pub async fn serve(addr: SocketAddr, pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening at {}", listener.local_addr()?);
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutting down"),
        Err(e) => log::error!("failed to listen for ctrl-c: {}", e),
    }
}
