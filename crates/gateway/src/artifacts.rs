//! Read-only access to canvas artifacts, so a browser can preview what the
//! agent wrote.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use flowdeck_core::error::StoreError;
use flowdeck_tools::ArtifactManager;
use tracing::debug;

use crate::SharedState;

/// Content type for an artifact path, by extension. Unknown types are served
/// as plain text.
pub fn content_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "md" => "text/markdown; charset=utf-8",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

/// GET /artifacts/{*path}
pub async fn get_artifact(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Response {
    match state.artifacts.read_file(&path).await {
        Ok(content) => ([(header::CONTENT_TYPE, content_type(&path))], content).into_response(),
        Err(StoreError::NotFound(message)) | Err(StoreError::PathEscape(message)) => {
            debug!(path = %path, "Artifact not found");
            (StatusCode::NOT_FOUND, message).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
