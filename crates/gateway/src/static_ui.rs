//! Prebuilt front end served from `gateway.ui_dir`.
//!
//! Any path that is not an API route and not a file in the directory gets
//! `index.html`, so client-side routes survive a page reload.

use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

pub fn ui_router(dir: &Path) -> Router {
    if !dir.join("index.html").is_file() {
        warn!(dir = %dir.display(), "ui_dir has no index.html");
    }
    info!(dir = %dir.display(), "Serving front end");

    let serve_dir = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
    Router::new().fallback_service(serve_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_files_and_falls_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<div id=app></div>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let (status, body) = get(ui_router(dir.path()), "/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1)");

        let (status, body) = get(ui_router(dir.path()), "/canvas/session/3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<div id=app></div>");
    }
}
