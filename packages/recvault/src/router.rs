use std::borrow::Cow;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::Method,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::{error::AppError, handlers, server::AppState};

pub const CAMERA_ASSET: &str = "camera.html";
pub const WATCH_ASSET: &str = "watch.html";
pub const INFO_ASSET: &str = "info.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Upload,
    Download(String),
    Custom(String),
    List,
    Asset(&'static str),
    Preflight,
    NotFound,
    MethodNotAllowed,
}

impl Route {
    /// Method first, then exact or prefix match on the decoded path.
    pub fn resolve(method: &Method, path: &str) -> Self {
        match (method, path) {
            (&Method::POST, "/upload") => Route::Upload,
            (&Method::POST, _) => Route::NotFound,
            (&Method::GET, p) if p.starts_with("/download/") => {
                Route::Download(trailing_segment(p).to_string())
            }
            (&Method::GET, p) if p.starts_with("/custom/") => {
                Route::Custom(trailing_segment(p).to_string())
            }
            (&Method::GET, "/files.json") => Route::List,
            (&Method::GET, "/") => Route::Asset(CAMERA_ASSET),
            (&Method::GET, "/watch") => Route::Asset(WATCH_ASSET),
            (&Method::GET, "/info") => Route::Asset(INFO_ASSET),
            (&Method::GET, _) => Route::NotFound,
            (&Method::OPTIONS, _) => Route::Preflight,
            _ => Route::MethodNotAllowed,
        }
    }
}

/// Everything after the last `/`. Not sanitised further.
pub fn trailing_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn decode_path(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let Some(store) = state.store().cloned() else {
        warn!(method = %req.method(), uri = %req.uri(), "request before storage was configured");
        return AppError::StorageNotConfigured.into_response();
    };

    let route = Route::resolve(req.method(), &decode_path(req.uri().path()));
    debug!(?route, "dispatch");
    match route {
        Route::Upload => handlers::upload(&state, &store, req).await,
        Route::Download(name) => handlers::download(&store, &name, req.headers())
            .await
            .into_response(),
        Route::Custom(name) => handlers::custom(&store, &name, req.headers())
            .await
            .into_response(),
        Route::List => handlers::list(&store).await.into_response(),
        Route::Asset(asset) => handlers::asset(&state.assets_dir, asset)
            .await
            .into_response(),
        Route::Preflight => handlers::preflight(),
        Route::NotFound => AppError::NotFound("Error 404: Not Found").into_response(),
        Route::MethodNotAllowed => AppError::MethodNotAllowed.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_method_then_path() {
        assert_eq!(Route::resolve(&Method::POST, "/upload"), Route::Upload);
        assert_eq!(Route::resolve(&Method::POST, "/upload/extra"), Route::NotFound);
        assert_eq!(Route::resolve(&Method::POST, "/download/a"), Route::NotFound);
        assert_eq!(
            Route::resolve(&Method::GET, "/download/1_a.webm"),
            Route::Download("1_a.webm".to_string())
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/custom/logo.png"),
            Route::Custom("logo.png".to_string())
        );
        assert_eq!(Route::resolve(&Method::GET, "/files.json"), Route::List);
        assert_eq!(Route::resolve(&Method::GET, "/"), Route::Asset(CAMERA_ASSET));
        assert_eq!(Route::resolve(&Method::GET, "/watch"), Route::Asset(WATCH_ASSET));
        assert_eq!(Route::resolve(&Method::GET, "/info"), Route::Asset(INFO_ASSET));
        assert_eq!(Route::resolve(&Method::GET, "/upload"), Route::NotFound);
        assert_eq!(Route::resolve(&Method::OPTIONS, "/anything"), Route::Preflight);
        assert_eq!(Route::resolve(&Method::DELETE, "/download/a"), Route::MethodNotAllowed);
        assert_eq!(Route::resolve(&Method::PUT, "/upload"), Route::MethodNotAllowed);
    }

    #[test]
    fn trailing_segment_takes_text_after_last_slash() {
        assert_eq!(trailing_segment("/download/a/b.webm"), "b.webm");
        assert_eq!(trailing_segment("/download/"), "");
    }

    #[test]
    fn decodes_percent_escapes_before_routing() {
        let decoded = decode_path("/download/my%20clip.webm");
        assert_eq!(
            Route::resolve(&Method::GET, &decoded),
            Route::Download("my clip.webm".to_string())
        );
    }
}
