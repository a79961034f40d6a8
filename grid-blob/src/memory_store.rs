use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, TryStreamExt};
use parking_lot::RwLock;

use crate::{
    ChunkReader, ChunkStore, ContentHash, GridError, GridResult, ObjectId, ObjectMetadata,
    StoreSession,
};

/// GridFS default chunk size
const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// In-memory chunk store.
///
/// Objects are kept as ordered chunk vectors, the way GridFS lays them out.
/// The store counts every session and query, and can inject faults, so it
/// doubles as the test backend for the read path.
#[derive(Clone)]
pub struct MemoryChunkStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    chunk_size: usize,
    objects: RwLock<HashMap<String, StoredObject>>,
    counters: Counters,
    faults: Faults,
}

#[derive(Clone)]
struct StoredObject {
    metadata: ObjectMetadata,
    chunks: Vec<Bytes>,
}

#[derive(Default)]
struct Counters {
    checkouts: AtomicU64,
    releases: AtomicU64,
    lookups: AtomicU64,
    exists_queries: AtomicU64,
    streams_opened: AtomicU64,
}

#[derive(Default)]
struct Faults {
    fail_checkout: AtomicBool,
    fail_lookup: AtomicBool,
    fail_exists: AtomicBool,
    /// Fail the read after this many chunks; `u64::MAX` disables
    fail_after_chunks: AtomicU64,
}

/// Snapshot of the store's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub checkouts: u64,
    pub releases: u64,
    pub lookups: u64,
    pub exists_queries: u64,
    pub streams_opened: u64,
}

impl MemoryStats {
    /// Sessions checked out and not yet released
    pub fn outstanding(&self) -> u64 {
        self.checkouts.saturating_sub(self.releases)
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        let faults = Faults::default();
        faults.fail_after_chunks.store(u64::MAX, Ordering::SeqCst);
        Self {
            inner: Arc::new(MemoryInner {
                chunk_size: chunk_size.max(1),
                objects: RwLock::new(HashMap::new()),
                counters: Counters::default(),
                faults,
            }),
        }
    }

    /// Store an object under `metadata.name`, replacing any previous one.
    ///
    /// `metadata.size` is kept as given, even if it disagrees with `data`.
    pub fn put(&self, metadata: ObjectMetadata, data: impl Into<Bytes>) {
        let data: Bytes = data.into();
        let chunks = data
            .chunks(self.inner.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();
        self.inner
            .objects
            .write()
            .insert(metadata.name.clone(), StoredObject { metadata, chunks });
    }

    /// Remove an object by name
    pub fn remove(&self, name: &str) -> Option<ObjectMetadata> {
        self.inner.objects.write().remove(name).map(|o| o.metadata)
    }

    pub fn stats(&self) -> MemoryStats {
        let c = &self.inner.counters;
        MemoryStats {
            checkouts: c.checkouts.load(Ordering::SeqCst),
            releases: c.releases.load(Ordering::SeqCst),
            lookups: c.lookups.load(Ordering::SeqCst),
            exists_queries: c.exists_queries.load(Ordering::SeqCst),
            streams_opened: c.streams_opened.load(Ordering::SeqCst),
        }
    }

    pub fn fail_checkouts(&self, fail: bool) {
        self.inner.faults.fail_checkout.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.inner.faults.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_exists_checks(&self, fail: bool) {
        self.inner.faults.fail_exists.store(fail, Ordering::SeqCst);
    }

    /// Make every chunk read fail once `chunks` chunks have been delivered
    pub fn fail_reads_after(&self, chunks: Option<u64>) {
        self.inner
            .faults
            .fail_after_chunks
            .store(chunks.unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    fn find_by_id(&self, id: &ObjectId) -> Option<StoredObject> {
        self.inner
            .objects
            .read()
            .values()
            .find(|o| &o.metadata.id == id)
            .cloned()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn checkout(&self) -> GridResult<Box<dyn StoreSession>> {
        if self.inner.faults.fail_checkout.load(Ordering::SeqCst) {
            return Err(GridError::backend(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "memory store checkout refused",
            )));
        }
        self.inner.counters.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
            released: false,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession {
    store: MemoryChunkStore,
    released: bool,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn lookup_by_name(&self, name: &str) -> GridResult<Option<ObjectMetadata>> {
        let inner = &self.store.inner;
        inner.counters.lookups.fetch_add(1, Ordering::SeqCst);
        if inner.faults.fail_lookup.load(Ordering::SeqCst) {
            return Err(GridError::backend(io::Error::new(
                io::ErrorKind::TimedOut,
                "memory store lookup failed",
            )));
        }
        Ok(inner.objects.read().get(name).map(|o| o.metadata.clone()))
    }

    async fn exists_by_id_and_hash(&self, id: &ObjectId, hash: &ContentHash) -> GridResult<u64> {
        let inner = &self.store.inner;
        inner.counters.exists_queries.fetch_add(1, Ordering::SeqCst);
        if inner.faults.fail_exists.load(Ordering::SeqCst) {
            return Err(GridError::backend(io::Error::new(
                io::ErrorKind::TimedOut,
                "memory store existence check failed",
            )));
        }
        let count = inner
            .objects
            .read()
            .values()
            .filter(|o| &o.metadata.id == id && o.metadata.content_hash.as_ref() == Some(hash))
            .count();
        Ok(count as u64)
    }

    async fn open_chunk_stream(&self, id: &ObjectId) -> GridResult<Option<ChunkReader>> {
        let Some(object) = self.store.find_by_id(id) else {
            return Ok(None);
        };
        let inner = &self.store.inner;
        inner.counters.streams_opened.fetch_add(1, Ordering::SeqCst);

        let fail_after = inner.faults.fail_after_chunks.load(Ordering::SeqCst);
        let chunks = object.chunks.into_iter().enumerate().map(move |(n, chunk)| {
            if n as u64 >= fail_after {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "injected chunk read failure"))
            } else {
                Ok(chunk)
            }
        });
        Ok(Some(Box::pin(stream::iter(chunks).into_async_read())))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.store.inner.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
