//! # grid-blob: streaming reads over chunked blob stores
//!
//! `grid-blob` is the storage half of the grid gateway. It resolves a file
//! name to its metadata record, checks client cache tags against the current
//! object state, and opens a forward-only byte stream over the object's
//! chunks that never holds more than one fixed-size buffer in memory.
//!
//! ## Key Features
//!
//! - **Streaming-first**: multi-gigabyte objects are served with O(buffer) memory
//! - **Chunk agnostic**: reads may span or fall short of stored chunk boundaries
//! - **Cheap re-validation**: `If-None-Match` style tags are checked with a single
//!   existence query, no body bytes are read
//! - **Storage agnostic**: GridFS and in-memory backends ship in the crate, anything
//!   implementing [`ChunkStore`] plugs in
//! - **Server agnostic**: no HTTP coupling; the axum layer lives in `grid-axum`
//!
//! ## Quick Start
//!
//! ```rust
//! use grid_blob::prelude::*;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> GridResult<()> {
//! let store = MemoryChunkStore::with_chunk_size(2);
//! store.put(
//!     ObjectMetadata::new(ObjectId::from("abc123"), "a.png", 5)
//!         .with_content_hash(ContentHash::from("deadbeef")),
//!     vec![1u8, 2, 3, 4, 5],
//! );
//!
//! let adapter = GridAdapter::new(store, GridConfig::default());
//! let session = adapter.checkout().await?;
//! let opened = adapter.open(session, "a.png").await?.expect("stored above");
//!
//! let mut body = Box::pin(opened.into_body_stream());
//! let mut received = Vec::new();
//! while let Some(chunk) = body.next().await {
//!     received.extend_from_slice(&chunk?);
//! }
//! assert_eq!(received, vec![1, 2, 3, 4, 5]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP layer    │  ← grid-axum: dispatch + streaming responder
//! ├─────────────────┤
//! │   GridAdapter   │  ← cache validation, name policy, stream opening
//! ├─────────────────┤
//! │   ChunkStore    │  ← lookup, existence check, chunk reads
//! └─────────────────┘
//! ```

pub mod adapter;
mod config;
mod error;
mod memory_store;
mod mongo_store;
mod reader;
pub mod store;
mod types;
mod validator;

pub use adapter::{GridAdapter, OpenedObject};
pub use config::{GridConfig, DEFAULT_CACHE_MAX_AGE, DEFAULT_CONTENT_TYPE};
pub use error::{GridError, GridResult};
pub use memory_store::{MemoryChunkStore, MemoryStats};
pub use mongo_store::{MongoConfig, MongoGridStore};
pub use reader::{ObjectReader, ReadOutcome, DEFAULT_BUFFER_SIZE};
pub use store::{ChunkReader, ChunkStore, SessionGuard, StoreSession};
pub use types::{CacheTag, ContentHash, ObjectId, ObjectMetadata, TAG_SEPARATOR};
pub use validator::{CacheDecision, CacheValidator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CacheDecision, ChunkStore, ContentHash, GridAdapter, GridConfig, GridError, GridResult,
        MemoryChunkStore, ObjectId, ObjectMetadata, OpenedObject,
    };
}
