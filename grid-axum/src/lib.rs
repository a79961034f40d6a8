//! grid-axum: Axum front door for grid-blob.
//!
//! One route: `GET /<name>` streams the named object, honouring
//! `If-None-Match`. Every other method is answered `405` without touching
//! the store.

pub mod app;
mod dispatch;
mod error;
pub mod respond;
pub mod state;

pub use app::{axum, GridAxumApp};
pub use error::GridAxumError;
pub use state::GridAxumState;
