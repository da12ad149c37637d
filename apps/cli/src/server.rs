use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;

#[derive(Clone)]
struct ServeState {
    output_dir: Arc<PathBuf>,
}

/// `/ping`, `/static/*` from `static_dir`, and every other path resolved
/// to a page under `output_dir`.
pub fn router(output_dir: PathBuf, static_dir: PathBuf) -> Router {
    let state = ServeState {
        output_dir: Arc::new(output_dir),
    };

    Router::new()
        .route("/ping", get(ping))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(page)
        .with_state(state)
}

pub async fn serve(app: Router, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Serving at http://{addr}");
    log::info!("Press Ctrl+C to stop");
    axum::serve(listener, app).await
}

async fn ping() -> &'static str {
    "pong"
}

async fn page(State(state): State<ServeState>, uri: Uri) -> Response {
    let target = page_path(&state.output_dir, uri.path());

    match tokio::fs::metadata(&target).await {
        Ok(metadata) if metadata.is_dir() => return StatusCode::NOT_FOUND.into_response(),
        Ok(_) => {}
        Err(error)
            if matches!(
                error.kind(),
                ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidInput
            ) =>
        {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(error) => return internal_error(&target, error),
    }

    match tokio::fs::read(&target).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "text/html")], bytes).into_response(),
        Err(error) => internal_error(&target, error),
    }
}

fn internal_error(target: &Path, error: std::io::Error) -> Response {
    log::error!("Failed to read {}: {error}", target.display());
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Maps a request path to `<output>/<path>.html`, or `<output>/index.html`
/// for the root. `..` segments never climb above the output directory.
pub fn page_path(output_dir: &Path, request_path: &str) -> PathBuf {
    let decoded = percent_decode_str(request_path).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        output_dir.join("index.html")
    } else {
        output_dir.join(format!("{}.html", segments.join("/")))
    }
}
