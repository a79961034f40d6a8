use std::fmt;
use std::ops::Deref;
use std::pin::Pin;

use async_trait::async_trait;
use futures::io::AsyncRead;
use tracing::debug;

use crate::{ContentHash, GridResult, ObjectId, ObjectMetadata};

/// Chunk-ordered byte reader over one object's data
pub type ChunkReader = Pin<Box<dyn AsyncRead + Send>>;

/// Chunk store backend - hands out per-request sessions from its pool
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Check out a session for the lifetime of one request
    async fn checkout(&self) -> GridResult<Box<dyn StoreSession>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Operations available on a checked-out session
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Resolve a file name to its metadata record
    async fn lookup_by_name(&self, name: &str) -> GridResult<Option<ObjectMetadata>>;

    /// Count records matching an identity and content hash
    async fn exists_by_id_and_hash(&self, id: &ObjectId, hash: &ContentHash) -> GridResult<u64>;

    /// Open a reader over the object's chunks, `None` if the object is gone
    async fn open_chunk_stream(&self, id: &ObjectId) -> GridResult<Option<ChunkReader>>;

    /// Return the session to its pool. Called exactly once, by [`SessionGuard`].
    fn release(&mut self);
}

/// Owns a checked-out session and releases it when dropped.
///
/// Release happens on every exit path of a request: normal completion, early
/// returns, errors, and client disconnects that drop the response body.
pub struct SessionGuard {
    session: Option<Box<dyn StoreSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn StoreSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Release now instead of at end of scope
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
            debug!("store session released");
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn StoreSession;

    fn deref(&self) -> &Self::Target {
        match &self.session {
            Some(session) => session.as_ref(),
            // `session` is only taken by `release_inner`, which consumes or drops the guard
            None => unreachable!("session guard used after release"),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("held", &self.session.is_some())
            .finish()
    }
}
