use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tracing::debug;

use crate::{
    CacheDecision, CacheValidator, ChunkStore, GridConfig, GridError, GridResult, ObjectMetadata,
    ObjectReader, SessionGuard,
};

/// The read-path adapter - what the HTTP layer embeds
#[derive(Clone)]
pub struct GridAdapter {
    store: Arc<dyn ChunkStore>,
    validator: CacheValidator,
    config: Arc<GridConfig>,
}

impl GridAdapter {
    /// Create a new adapter over a store
    pub fn new<S: ChunkStore + 'static>(store: S, config: GridConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Create from a shared store handle
    pub fn from_arc(store: Arc<dyn ChunkStore>, config: GridConfig) -> Self {
        Self {
            store,
            validator: CacheValidator::new(),
            config: Arc::new(config),
        }
    }

    /// Check out a session for one request
    pub async fn checkout(&self) -> GridResult<SessionGuard> {
        let session = self.store.checkout().await?;
        debug!(store = self.store.name(), "store session checked out");
        Ok(SessionGuard::new(session))
    }

    /// Check an inbound cache tag against the current object state
    pub async fn validate(&self, session: &SessionGuard, tag: Option<&str>) -> CacheDecision {
        self.validator.validate(tag, &**session).await
    }

    /// Resolve `name` and open its byte stream.
    ///
    /// Returns `Ok(None)` for excluded names, unknown names, and objects that
    /// vanish between lookup and open. The session moves into the opened
    /// object and stays checked out until that object is dropped; on every
    /// other path it is released before this returns.
    pub async fn open(&self, session: SessionGuard, name: &str) -> GridResult<Option<OpenedObject>> {
        if name.is_empty() || self.config.is_excluded(name) {
            debug!(name, "name bypasses the store");
            return Ok(None);
        }

        let Some(metadata) = session.lookup_by_name(name).await? else {
            debug!(name, "no metadata for name");
            return Ok(None);
        };

        let Some(chunks) = session.open_chunk_stream(&metadata.id).await? else {
            debug!(name, id = %metadata.id, "object vanished before open");
            return Ok(None);
        };

        let reader = ObjectReader::new(chunks, self.config.buffer_size, metadata.size);
        Ok(Some(OpenedObject {
            metadata,
            reader,
            session,
        }))
    }

    /// Get configuration
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

/// An object resolved and opened for reading.
///
/// Holds its session; dropping the object (or the stream made from it)
/// closes the reader first and then releases the session.
pub struct OpenedObject {
    pub metadata: ObjectMetadata,
    reader: ObjectReader,
    session: SessionGuard,
}

impl OpenedObject {
    /// Stream the body frame by frame; the session is released when the
    /// stream is exhausted, fails, or is dropped.
    pub fn into_body_stream(self) -> impl Stream<Item = GridResult<Bytes>> + Send + 'static {
        let Self {
            reader, session, ..
        } = self;
        futures::stream::try_unfold((reader, Some(session)), |(mut reader, mut session)| async move {
            let outcome = reader.read().await?;
            if outcome.done {
                if let Some(session) = session.take() {
                    session.release();
                }
                return Ok::<_, GridError>(None);
            }
            let frame = Bytes::copy_from_slice(reader.filled());
            Ok(Some((frame, (reader, session))))
        })
    }
}

impl std::fmt::Debug for OpenedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedObject")
            .field("metadata", &self.metadata)
            .field("reader", &self.reader)
            .field("session", &self.session)
            .finish()
    }
}
