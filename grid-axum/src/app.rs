use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use grid_blob::GridAdapter;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dispatch;
use crate::GridAxumState;

pub struct GridAxumApp {
    pub blobs: Arc<GridAdapter>,
    pub router: Router<()>,
}

impl Clone for GridAxumApp {
    fn clone(&self) -> Self {
        Self {
            blobs: Arc::clone(&self.blobs),
            router: self.router.clone(),
        }
    }
}

impl GridAxumApp {
    pub fn new(blobs: GridAdapter) -> Self {
        let state = GridAxumState::new(blobs);
        let blobs = Arc::clone(&state.blobs);

        let router = Router::new()
            .route("/", any(dispatch::serve_root))
            .route("/{*path}", any(dispatch::serve_path))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        Self { blobs, router }
    }

    /// Bound the time a request may take to produce its response head.
    ///
    /// The body stream itself is not covered; a slow client reading a large
    /// object is not cut off by this.
    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout));
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, store = self.blobs.store_name(), "listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn axum(blobs: GridAdapter) -> GridAxumApp {
    GridAxumApp::new(blobs)
}
