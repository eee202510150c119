//! `GET /:filename` — downloads a file, whether still uploading or already
//! finished (§6). Falls through to the blob store directly once the
//! registry no longer has an active entry (the "glue" façade of §2).

use std::io::SeekFrom;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use bytes::Bytes;
use futures::stream::try_unfold;
use headers::Range;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::blobstore::{BlobReader, BlobStore};
use crate::registry::TailingReader;
use crate::state::AppState;

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Streams a file back, tailing it if the upload is still in flight.
/// Honors a single-range `Range` request.
///
/// ```http
/// GET /3o8xf1q2k9z7r.png HTTP/1.1
/// ```
pub(crate) async fn handle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    range: Option<TypedHeader<Range>>,
) -> Response {
    if let Some(reader) = state.registry.get_reader(&name).await {
        return serve_tailing(reader, range).await;
    }

    if state.registry.blob_store().exists(&name).await {
        return match state.registry.blob_store().get_reader(&name).await {
            Ok(reader) => serve_finished(reader, range).await,
            Err(_) => StatusCode::NOT_FOUND.into_response(),
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

fn requested_range(range: Option<TypedHeader<Range>>, total: u64) -> Option<(u64, u64)> {
    let TypedHeader(range) = range?;
    range.satisfiable_ranges(total).next().map(|(start, end)| {
        let start = match start {
            std::ops::Bound::Included(n) => n,
            std::ops::Bound::Excluded(n) => n + 1,
            std::ops::Bound::Unbounded => 0,
        };
        let end = match end {
            std::ops::Bound::Included(n) => n,
            std::ops::Bound::Excluded(n) => n.saturating_sub(1),
            std::ops::Bound::Unbounded => total.saturating_sub(1),
        };
        (start, end)
    })
}

async fn serve_tailing(mut reader: TailingReader, range: Option<TypedHeader<Range>>) -> Response {
    let total = reader.size().await;
    let content_type = reader.content_type().to_string();
    let requested = requested_range(range, total);

    let (start, end, status) = match requested {
        Some((start, end)) if start <= end && end < total => (start, end, StatusCode::PARTIAL_CONTENT),
        Some(_) => return StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => (0, total.saturating_sub(1), StatusCode::OK),
    };

    if let Err(e) = reader.seek(SeekFrom::Start(start)).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    let remaining = end + 1 - start;
    let stream = try_unfold((reader, remaining), move |(mut reader, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }
        let want = remaining.min(STREAM_CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; want];
        let n = reader.read_io(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), (reader, remaining - n as u64))))
    });

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, remaining.to_string());

    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total}"),
        );
    }

    response
        .body(Body::from_stream(stream))
        .expect("response headers are always valid")
}

async fn serve_finished(mut reader: BlobReader, range: Option<TypedHeader<Range>>) -> Response {
    let total = reader.len();
    let content_type = reader.content_type().to_string();
    let requested = requested_range(range, total);

    let (start, end, status) = match requested {
        Some((start, end)) if start <= end && end < total => (start, end, StatusCode::PARTIAL_CONTENT),
        Some(_) => return StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => (0, total.saturating_sub(1), StatusCode::OK),
    };

    if let Err(e) = reader.seek(SeekFrom::Start(start)).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    let remaining = end + 1 - start;
    let limited = reader.take(remaining);
    let stream = tokio_util::io::ReaderStream::new(limited);

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, remaining.to_string());

    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total}"),
        );
    }

    if let Some(modified) = last_modified_header(&reader) {
        response = response.header(header::LAST_MODIFIED, modified);
    }

    response
        .body(Body::from_stream(stream))
        .expect("response headers are always valid")
}

fn last_modified_header(reader: &BlobReader) -> Option<HeaderValue> {
    let modified = reader.modified()?;
    let modified: chrono::DateTime<chrono::Utc> = modified.into();
    HeaderValue::from_str(&modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}
