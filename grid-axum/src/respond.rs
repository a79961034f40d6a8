//! Streaming responder: status lines, headers, and the body copy.
//!
//! Headers are fully decided before the body is attached; once the first
//! frame is out, a failure can only abort the connection.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use grid_blob::{GridConfig, OpenedObject};
use tracing::error;

use crate::GridAxumError;

pub const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

pub fn method_not_allowed() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// 404 with no body and no content headers
pub fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// 304 echoing the client's tag with the same caching directive as a 200
pub fn not_modified(config: &GridConfig, tag: &HeaderValue) -> Result<Response, GridAxumError> {
    let response = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(CACHE_CONTROL, config.cache_control())
        .header(ETAG, tag.clone())
        .body(Body::empty())?;
    Ok(response)
}

/// 200 with the object streamed one buffer at a time.
///
/// A read failure after this returns is logged and turned into a body error,
/// which makes the server drop the connection short of `Content-Length`.
pub fn stream_object(config: &GridConfig, opened: OpenedObject) -> Result<Response, GridAxumError> {
    let meta = &opened.metadata;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CACHE_CONTROL, config.cache_control());

    if let Some(tag) = meta.cache_tag() {
        builder = builder.header(ETAG, tag.to_string());
    }
    if let Some(hash) = &meta.content_hash {
        builder = builder.header(CONTENT_MD5, hash.as_str());
    }

    builder = builder
        .header(CONTENT_TYPE, content_type(config, meta.content_type.as_deref()))
        .header(CONTENT_LENGTH, meta.size);

    let name = meta.name.clone();
    let id = meta.id.clone();
    let body = opened.into_body_stream().map_err(move |e| {
        error!(name = %name, id = %id, error = %e, "aborting response mid-stream");
        std::io::Error::other(e)
    });

    Ok(builder.body(Body::from_stream(body))?)
}

fn content_type(config: &GridConfig, declared: Option<&str>) -> HeaderValue {
    declared
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .or_else(|| HeaderValue::from_str(&config.fallback_content_type).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"))
}
