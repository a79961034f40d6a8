use std::fmt;
use std::io;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId as Oid;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, GridFsErrorKind};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::{GridFsBucketOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

use crate::{
    ChunkReader, ChunkStore, ContentHash, GridError, GridResult, ObjectId, ObjectMetadata,
    StoreSession,
};

/// Connection settings for a GridFS bucket
#[derive(Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// MongoDB connection string
    pub uri: String,
    /// Database holding the bucket; required
    pub database: String,
    /// Bucket prefix (`<bucket>.files` / `<bucket>.chunks`)
    pub bucket: String,
}

impl MongoConfig {
    pub fn new<U, D>(uri: U, database: D) -> Self
    where
        U: Into<String>,
        D: Into<String>,
    {
        Self {
            uri: uri.into(),
            database: database.into(),
            bucket: "fs".to_string(),
        }
    }

    /// Direct connection to a single `host:port`
    pub fn from_host_port<D: Into<String>>(host: &str, port: u16, database: D) -> Self {
        Self::new(
            format!("mongodb://{host}:{port}/?directConnection=true"),
            database,
        )
    }

    pub fn with_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.database.trim().is_empty() {
            return Err(GridError::config("a GridFS database name is required"));
        }
        if self.bucket.trim().is_empty() {
            return Err(GridError::config("the GridFS bucket name must not be empty"));
        }
        Ok(())
    }

    fn files_collection(&self) -> String {
        format!("{}.files", self.bucket)
    }
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the connection string may carry credentials
        f.debug_struct("MongoConfig")
            .field("database", &self.database)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// GridFS-backed chunk store.
///
/// The driver's `Client` owns the connection pool; checkouts are cheap
/// handle clones and release hands nothing back explicitly.
#[derive(Clone)]
pub struct MongoGridStore {
    client: Client,
    config: MongoConfig,
}

impl MongoGridStore {
    pub async fn connect(config: MongoConfig) -> GridResult<Self> {
        config.validate()?;
        let client = Client::with_uri_str(&config.uri).await?;
        info!(database = %config.database, bucket = %config.bucket, "connected to GridFS");
        Ok(Self { client, config })
    }

    /// Create the lookup indexes on `<bucket>.files` if they are missing
    pub async fn ensure_indexes(&self) -> GridResult<()> {
        let options = IndexOptions::builder()
            .unique(false)
            .background(true)
            .sparse(false)
            .build();

        let by_name = IndexModel::builder()
            .keys(doc! { "filename": 1, "uploadDate": -1 })
            .options(options.clone())
            .build();
        let by_tag = IndexModel::builder()
            .keys(doc! { "_id": 1, "md5": 1 })
            .options(options)
            .build();

        self.files().create_indexes(vec![by_name, by_tag]).await?;
        info!(collection = %self.config.files_collection(), "GridFS indexes ensured");
        Ok(())
    }

    fn files(&self) -> Collection<Document> {
        self.client
            .database(&self.config.database)
            .collection::<Document>(&self.config.files_collection())
    }

    fn bucket(&self) -> GridFsBucket {
        let options = GridFsBucketOptions::builder()
            .bucket_name(Some(self.config.bucket.clone()))
            .build();
        self.client
            .database(&self.config.database)
            .gridfs_bucket(options)
    }
}

impl fmt::Debug for MongoGridStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoGridStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChunkStore for MongoGridStore {
    async fn checkout(&self) -> GridResult<Box<dyn StoreSession>> {
        Ok(Box::new(MongoSession {
            files: self.files(),
            bucket: self.bucket(),
        }))
    }

    fn name(&self) -> &'static str {
        "gridfs"
    }
}

struct MongoSession {
    files: Collection<Document>,
    bucket: GridFsBucket,
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn lookup_by_name(&self, name: &str) -> GridResult<Option<ObjectMetadata>> {
        let found = self
            .files
            .find_one(doc! { "filename": name })
            .sort(doc! { "uploadDate": -1 })
            .await?;
        found.map(|doc| metadata_from_document(name, &doc)).transpose()
    }

    async fn exists_by_id_and_hash(&self, id: &ObjectId, hash: &ContentHash) -> GridResult<u64> {
        let count = self.files.count_documents(tag_filter(id, hash)).await?;
        Ok(count)
    }

    async fn open_chunk_stream(&self, id: &ObjectId) -> GridResult<Option<ChunkReader>> {
        match self.bucket.open_download_stream(id_to_bson(id)).await {
            Ok(stream) => Ok(Some(Box::pin(stream))),
            Err(e) if is_file_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&mut self) {
        debug!("GridFS session handle dropped");
    }
}

fn is_file_not_found(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })
    )
}

/// `{_id, md5}` filter matching the files record a cache tag was built from
fn tag_filter(id: &ObjectId, hash: &ContentHash) -> Document {
    doc! { "_id": id_to_bson(id), "md5": hash.as_str() }
}

fn id_to_bson(id: &ObjectId) -> Bson {
    match Oid::parse_str(id.as_str()) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.as_str().to_string()),
    }
}

fn invalid_document(name: &str, what: &str) -> GridError {
    GridError::backend(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("files document for {name:?} has {what}"),
    ))
}

/// Map a `<bucket>.files` document to metadata
fn metadata_from_document(name: &str, doc: &Document) -> GridResult<ObjectMetadata> {
    let id = match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        _ => return Err(invalid_document(name, "an unsupported _id")),
    };

    let size = match doc.get("length") {
        Some(Bson::Int64(n)) if *n >= 0 => *n as u64,
        Some(Bson::Int32(n)) if *n >= 0 => *n as u64,
        Some(Bson::Double(n)) if *n >= 0.0 => *n as u64,
        _ => return Err(invalid_document(name, "no valid length")),
    };

    let mut metadata = ObjectMetadata::new(ObjectId::from_string(id), name, size);

    if let Ok(md5) = doc.get_str("md5") {
        if !md5.is_empty() {
            metadata = metadata.with_content_hash(ContentHash::from(md5));
        }
    }

    let content_type = doc
        .get_str("contentType")
        .ok()
        .or_else(|| {
            doc.get_document("metadata")
                .ok()
                .and_then(|m| m.get_str("contentType").ok())
        })
        .filter(|ct| !ct.is_empty());
    if let Some(ct) = content_type {
        metadata = metadata.with_content_type(ct);
    }

    Ok(metadata)
}
