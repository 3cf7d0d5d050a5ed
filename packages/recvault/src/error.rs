use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Request timed out.")]
    Timeout,
    #[error("Error: Method Not Allowed")]
    MethodNotAllowed,
    #[error("range not satisfiable")]
    RangeNotSatisfiable(u64),
    #[error("Server Error: Storage not configured.")]
    StorageNotConfigured,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::StorageNotConfigured | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();
        if let AppError::RangeNotSatisfiable(size) = &self {
            if let Ok(v) = HeaderValue::from_str(&format!("bytes */{size}")) {
                headers.insert(header::CONTENT_RANGE, v);
            }
        }
        // Raw I/O details stay in the logs.
        let body = match &self {
            AppError::Io(_) => "Error: Could not complete the request.".to_string(),
            other => other.to_string(),
        };
        (status, headers, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BadRequest(msg) => AppError::BadRequest(msg),
            StoreError::NotFound => AppError::NotFound("Error: File not found."),
            StoreError::Timeout { .. } => AppError::Timeout,
            StoreError::Incomplete { written, expected, .. } => AppError::BadRequest(format!(
                "Upload incomplete: received {written} of {expected} bytes."
            )),
            StoreError::NameExhausted(attempts) => {
                AppError::Internal(format!("Error during upload: no free name after {attempts} attempts."))
            }
            StoreError::Io(e) => AppError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let status = |e: StoreError| AppError::from(e).status();
        assert_eq!(status(StoreError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(StoreError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Timeout { name: "a".into(), written: 1 }),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            status(StoreError::Incomplete { name: "a".into(), written: 1, expected: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(StoreError::NameExhausted(16)), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn io_details_stay_out_of_the_body() {
        use http_body_util::BodyExt;

        let resp = AppError::Io(std::io::Error::other("/secret/path")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Error: Could not complete the request.");
    }

    #[test]
    fn unsatisfiable_range_reports_the_size() {
        let resp = AppError::RangeNotSatisfiable(42).into_response();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes */42");
    }
}
