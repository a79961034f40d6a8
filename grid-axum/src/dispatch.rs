use axum::extract::{Path, State};
use axum::http::header::IF_NONE_MATCH;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use grid_blob::CacheDecision;
use tracing::{debug, instrument};

use crate::{respond, GridAxumError, GridAxumState};

pub(crate) async fn serve_root(
    State(state): State<GridAxumState>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(state, method, headers, "").await
}

pub(crate) async fn serve_path(
    State(state): State<GridAxumState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
) -> Response {
    let name = path.rsplit('/').next().unwrap_or_default();
    serve(state, method, headers, name).await
}

#[instrument(skip_all, fields(method = %method, name = %name))]
async fn serve(state: GridAxumState, method: Method, headers: HeaderMap, name: &str) -> Response {
    if method != Method::GET {
        debug!("method not allowed");
        return respond::method_not_allowed();
    }

    match retrieve(&state, &headers, name).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn retrieve(
    state: &GridAxumState,
    headers: &HeaderMap,
    name: &str,
) -> Result<Response, GridAxumError> {
    let blobs = &state.blobs;
    let session = blobs.checkout().await?;

    let if_none_match = headers.get(IF_NONE_MATCH);
    // a non-ASCII header can never parse; keep it present so it counts as malformed
    let raw_tag = if_none_match.map(|v| v.to_str().unwrap_or_default());

    match (blobs.validate(&session, raw_tag).await, if_none_match) {
        (CacheDecision::Fresh(tag), Some(echo)) => {
            debug!(%tag, "not modified");
            return respond::not_modified(blobs.config(), echo);
        }
        (decision, _) => debug!(?decision, "cache check"),
    }

    match blobs.open(session, name).await? {
        Some(opened) => {
            debug!(id = %opened.metadata.id, size = opened.metadata.size, "streaming object");
            respond::stream_object(blobs.config(), opened)
        }
        None => {
            debug!("not found");
            Ok(respond::not_found())
        }
    }
}
