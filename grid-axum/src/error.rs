use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grid_blob::GridError;
use tracing::{debug, warn};

/// Faults raised before any header is committed
#[derive(Debug)]
pub struct GridAxumError(pub anyhow::Error);

impl From<anyhow::Error> for GridAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<GridError> for GridAxumError {
    fn from(e: GridError) -> Self {
        Self(e.into())
    }
}

impl From<axum::http::Error> for GridAxumError {
    fn from(e: axum::http::Error) -> Self {
        Self(e.into())
    }
}

impl GridAxumError {
    fn grid_error(&self) -> Option<&GridError> {
        self.0.chain().find_map(|e| e.downcast_ref::<GridError>())
    }

    pub fn status(&self) -> StatusCode {
        match self.grid_error() {
            Some(GridError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GridAxumError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.grid_error().is_some_and(GridError::is_expected) {
            debug!(error = %self.0, %status, "request ended early");
        } else {
            warn!(error = %self.0, %status, "request failed before headers were sent");
        }
        // no body: backend details stay in the logs
        status.into_response()
    }
}
