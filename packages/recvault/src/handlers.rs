use std::{io::SeekFrom, path::Path};

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::{
    capacity,
    error::AppError,
    server::AppState,
    store::{self, FileStore, ListedFile, OpenedFile, StoreError},
};

pub const VIDEO_WEBM: &str = "video/webm";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html";

pub async fn upload(state: &AppState, store: &FileStore, req: Request) -> Response {
    let headers = req.headers();
    let hint = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());

    let body = req.into_body().into_data_stream();
    let result = store
        .store(hint.as_deref(), content_length, body, state.read_timeout)
        .await;

    let wrote_file = match &result {
        Ok(_) => true,
        Err(e) => e.wrote_file(),
    };
    if wrote_file {
        reclaim_space(state, store).await;
    }

    let mut response = match result {
        Ok(_) => (StatusCode::OK, "File uploaded successfully.").into_response(),
        Err(e) => {
            match &e {
                StoreError::BadRequest(_) => {
                    warn!(hint = ?hint, content_length = ?content_length, "upload rejected: Content-Length missing or invalid")
                }
                StoreError::Timeout { .. } | StoreError::Incomplete { .. } => {}
                other => error!(hint = ?hint, error = %other, "unexpected error during file upload"),
            }
            AppError::from(e).into_response()
        }
    };
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Runs eviction on a blocking thread and waits for it before responding.
async fn reclaim_space(state: &AppState, store: &FileStore) {
    let dir = store.root().to_path_buf();
    let probe = state.space.clone();
    match tokio::task::spawn_blocking(move || capacity::reclaim_if_needed(&dir, probe.as_ref())).await {
        Ok(Some(report)) => info!(
            target_bytes = report.target,
            freed = report.freed,
            deleted = report.deleted.len(),
            "reclaimed storage"
        ),
        Ok(None) => {}
        Err(e) => error!(error = %e, "storage capacity management failed"),
    }
}

pub async fn list(store: &FileStore) -> Result<Response, AppError> {
    let files = store.list().await;
    let body = files_json(&files).map_err(|e| {
        error!(error = %e, "error serving file list as JSON");
        AppError::Internal("Error generating file list.".to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, APPLICATION_JSON)], body).into_response())
}

/// Names first, then sizes in the same order: `["b","a",50,100]`.
pub fn files_json(files: &[ListedFile]) -> serde_json::Result<String> {
    let values: Vec<serde_json::Value> = files
        .iter()
        .map(|f| serde_json::Value::from(f.name.as_str()))
        .chain(files.iter().map(|f| serde_json::Value::from(f.size)))
        .collect();
    serde_json::to_string(&values)
}

pub async fn download(store: &FileStore, name: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    let opened = store.open_for_read(name).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("Error: File not found."),
        other => {
            error!(file = name, error = %other, "error serving video file");
            AppError::Internal(format!("Error: Could not read {name}."))
        }
    })?;
    serve_file(opened, VIDEO_WEBM, headers).await
}

pub async fn custom(store: &FileStore, name: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    let opened = store.open_custom_for_read(name).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("Error: File not found in the 'custom' directory."),
        other => {
            error!(file = name, error = %other, "error serving custom file");
            AppError::Internal("Error: Could not read the requested file.".to_string())
        }
    })?;
    serve_file(opened, OCTET_STREAM, headers).await
}

pub async fn asset(assets_dir: &Path, asset: &str) -> Result<Response, AppError> {
    let opened = store::open_regular(&assets_dir.join(asset))
        .await
        .map_err(|e| {
            debug!(asset = asset, error = %e, "asset unavailable");
            AppError::NotFound("Error 404: Asset Not Found")
        })?;
    let body = Body::from_stream(ReaderStream::new(opened.file));
    Ok(([(header::CONTENT_TYPE, TEXT_HTML)], body).into_response())
}

pub fn preflight() -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, X-Filename"),
        ],
    )
        .into_response()
}

/// Streams the file, honouring a single `Range` request.
async fn serve_file(
    opened: OpenedFile,
    content_type: &'static str,
    request_headers: &HeaderMap,
) -> Result<Response, AppError> {
    let OpenedFile { mut file, len, .. } = opened;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let Some((start, end)) = parse_range(request_headers.get(header::RANGE), len)? else {
        let body = Body::from_stream(ReaderStream::new(file));
        return Ok((StatusCode::OK, headers, body).into_response());
    };

    let length = end - start + 1;
    file.seek(SeekFrom::Start(start)).await?;
    let content_range = HeaderValue::from_str(&format!("bytes {start}-{end}/{len}"))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    headers.insert(header::CONTENT_RANGE, content_range);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
}

/// Parses `bytes=a-b`, `bytes=a-` and `bytes=-n`. Malformed or multi-range
/// headers are ignored; ranges starting past the end are unsatisfiable.
pub fn parse_range(value: Option<&HeaderValue>, len: u64) -> Result<Option<(u64, u64)>, AppError> {
    let Some(ranges) = value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes="))
    else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((start_part, end_part)) = ranges.split_once('-') else {
        return Ok(None);
    };
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    // A syntactically valid range on an empty file is always unsatisfiable;
    // anything unparseable falls back to the full (empty) body first.
    let (start, end) = if start_part.is_empty() {
        let Ok(suffix) = end_part.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || len == 0 {
            return Err(AppError::RangeNotSatisfiable(len));
        }
        (len.saturating_sub(suffix), len - 1)
    } else {
        let Ok(start) = start_part.parse::<u64>() else {
            return Ok(None);
        };
        let end = if end_part.is_empty() {
            None
        } else {
            match end_part.parse::<u64>() {
                Ok(end) => Some(end),
                Err(_) => return Ok(None),
            }
        };
        if start >= len {
            return Err(AppError::RangeNotSatisfiable(len));
        }
        (start, end.map_or(len - 1, |end| end.min(len - 1)))
    };

    if start > end {
        return Ok(None);
    }
    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn listed(name: &str, size: u64) -> ListedFile {
        ListedFile {
            name: name.to_string(),
            size,
            modified: UNIX_EPOCH,
        }
    }

    fn range(v: &str, len: u64) -> Result<Option<(u64, u64)>, AppError> {
        parse_range(Some(&HeaderValue::from_str(v).unwrap()), len)
    }

    #[test]
    fn files_json_splits_names_and_sizes() {
        let files = vec![listed("b.mp4", 2048), listed("a.mp4", 1024)];
        assert_eq!(files_json(&files).unwrap(), r#"["b.mp4","a.mp4",2048,1024]"#);
    }

    #[test]
    fn files_json_of_nothing_is_an_empty_array() {
        assert_eq!(files_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn files_json_escapes_names() {
        let files = vec![ListedFile {
            name: "say \"hi\".webm".to_string(),
            size: 1,
            modified: SystemTime::now(),
        }];
        assert_eq!(files_json(&files).unwrap(), r#"["say \"hi\".webm",1]"#);
    }

    #[test]
    fn range_forms() {
        assert_eq!(range("bytes=0-9", 100).unwrap(), Some((0, 9)));
        assert_eq!(range("bytes=90-", 100).unwrap(), Some((90, 99)));
        assert_eq!(range("bytes=-10", 100).unwrap(), Some((90, 99)));
        assert_eq!(range("bytes=50-5000", 100).unwrap(), Some((50, 99)));
        assert_eq!(range("bytes=-500", 100).unwrap(), Some((0, 99)));
    }

    #[test]
    fn malformed_ranges_are_ignored() {
        assert_eq!(parse_range(None, 100).unwrap(), None);
        assert_eq!(range("items=0-9", 100).unwrap(), None);
        assert_eq!(range("bytes=0-1,5-6", 100).unwrap(), None);
        assert_eq!(range("bytes=x-9", 100).unwrap(), None);
        assert_eq!(range("bytes=9-3", 100).unwrap(), None);
    }

    #[test]
    fn ranges_past_the_end_are_unsatisfiable() {
        assert!(matches!(range("bytes=100-", 100), Err(AppError::RangeNotSatisfiable(100))));
        assert!(matches!(range("bytes=0-", 0), Err(AppError::RangeNotSatisfiable(0))));
        assert!(matches!(range("bytes=-5", 0), Err(AppError::RangeNotSatisfiable(0))));
    }

    #[test]
    fn malformed_ranges_on_an_empty_file_are_ignored() {
        assert_eq!(range("bytes=x-9", 0).unwrap(), None);
        assert_eq!(range("bytes=0-y", 0).unwrap(), None);
        assert_eq!(range("bytes=-z", 0).unwrap(), None);
        assert_eq!(range("bytes=0-1,5-6", 0).unwrap(), None);
    }
}
