//! Static file fallback.
//!
//! # Lookup Order
//! ```text
//! /assets/img/logo.png
//!     dist/assets/img/logo.png            file → serve
//!     dist/assets/img  (+ /index.html)    dir with index → serve index
//!     dist/assets      (+ /index.html)
//!     dist             (+ /index.html)
//!     → 404
//! ```
//!
//! # Design Decisions
//! - Deepest candidate first, then progressively toward the root
//! - `.`/`..` segments are never joined onto the root
//! - Actual file transfer (ranges, mime, conditional GET) via tower-http

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::routing::PathStack;

/// Serves files below a fixed root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the file to serve for the full original path of `stack`.
    pub async fn locate(&self, stack: &mut PathStack) -> Option<PathBuf> {
        stack.reset();

        let mut current = self.root.clone();
        let mut candidates = vec![current.clone()];
        while stack.remaining_depth() > 0 {
            let segment = stack.pop();
            if !is_safe_segment(&segment) {
                return None;
            }
            current.push(segment);
            candidates.push(current.clone());
        }

        for candidate in candidates.into_iter().rev() {
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_dir() => {
                    let index = candidate.join("index.html");
                    if let Ok(meta) = tokio::fs::metadata(&index).await {
                        if meta.is_file() {
                            return Some(index);
                        }
                    }
                }
                Ok(_) => return Some(candidate),
                Err(_) => {}
            }
        }

        None
    }

    /// Serve the best match for `stack`, or 404.
    pub async fn serve(&self, stack: &mut PathStack, request: Request<Body>) -> Response {
        let Some(path) = self.locate(stack).await else {
            tracing::info!(path = %request.uri().path(), "Not found");
            return StatusCode::NOT_FOUND.into_response();
        };

        tracing::debug!(file = %path.display(), "Serving static file");
        match ServeFile::new(&path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "Failed to serve static file");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn is_safe_segment(segment: &str) -> bool {
    segment != "." && segment != ".." && !segment.contains(['\\', '\0'])
}
