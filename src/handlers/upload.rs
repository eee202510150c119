//! `PUT /:filename` — consumes the upload stream (§6).

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::{error, info};

use crate::registry::UploadError;
use crate::state::AppState;
use crate::user_key::user_key_from_headers;

/// Streams the body of an in-flight upload to its reserved filename.
///
/// ```http
/// PUT /3o8xf1q2k9z7r.png HTTP/1.1
/// Content-Type: image/png
/// Content-Length: 123456
///
/// <bytes>
/// ```
pub(crate) async fn handle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let content_type = headers.get(axum::http::header::CONTENT_TYPE);
    if content_type.map(|v| v.is_empty()).unwrap_or(true) {
        return (StatusCode::BAD_REQUEST, "missing Content-Type").into_response();
    }

    let declared_length = match parse_content_length(&headers, state.max_upload_bytes) {
        Ok(n) => n,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    let user_key = user_key_from_headers(&headers);

    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let reader = StreamReader::new(stream);

    match state
        .registry
        .upload(&name, reader, declared_length, user_key)
        .await
    {
        Ok(()) => {
            info!(name, declared_length, "upload completed");
            StatusCode::OK.into_response()
        }
        Err(UploadError::NoPreparedUpload) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "NoPreparedUpload").into_response()
        }
        Err(UploadError::AlreadyUploading) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "AlreadyUploading").into_response()
        }
        Err(e @ UploadError::LengthMismatch { .. }) => {
            error!(name, error = %e, "upload aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e @ UploadError::Io(_)) => {
            error!(name, error = %e, "upload aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Validates `Content-Length` against the specification's bound:
/// `(0, 200 MiB)`, exclusive on both ends (§6).
fn parse_content_length(headers: &HeaderMap, max_upload_bytes: u64) -> Result<u64, &'static str> {
    let value = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .ok_or("missing Content-Length")?;
    let value = value.to_str().map_err(|_| "invalid Content-Length")?;
    let length: u64 = value.parse().map_err(|_| "invalid Content-Length")?;

    if length == 0 {
        return Err("Content-Length must be greater than 0");
    }
    if length >= max_upload_bytes {
        return Err("Content-Length too large");
    }
    Ok(length)
}
