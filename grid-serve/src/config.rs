use std::time::Duration;

use clap::Parser;
use grid_blob::{
    GridConfig, GridError, MongoConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CACHE_MAX_AGE,
    DEFAULT_CONTENT_TYPE,
};

/// Serve files from a GridFS bucket over HTTP
#[derive(Debug, Parser)]
#[command(name = "grid-serve", version, about)]
pub struct Args {
    /// Host of the GridFS database
    #[arg(long, env = "GRIDSERVE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the GridFS database
    #[arg(long, env = "GRIDSERVE_PORT", default_value_t = 27017)]
    pub port: u16,

    /// Full MongoDB connection string; overrides --host/--port
    #[arg(long, env = "GRIDSERVE_URI")]
    pub uri: Option<String>,

    /// Name of the GridFS database (required)
    #[arg(long, env = "GRIDSERVE_DATABASE")]
    pub database: Option<String>,

    /// Name of the GridFS collection (bucket prefix)
    #[arg(long, env = "GRIDSERVE_COLLECTION", default_value = "fs")]
    pub collection: String,

    /// address:port to listen on; a bare :port means all interfaces
    #[arg(long, env = "GRIDSERVE_LISTEN", default_value = ":8080")]
    pub listen: String,

    /// Worker threads for the runtime
    #[arg(long, env = "GRIDSERVE_CPUCORES", default_value_t = 1)]
    pub cpucores: usize,

    /// Per-stream read buffer in bytes
    #[arg(long, env = "GRIDSERVE_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Cache-Control max-age in seconds
    #[arg(long, env = "GRIDSERVE_CACHE_MAX_AGE", default_value_t = DEFAULT_CACHE_MAX_AGE)]
    pub cache_max_age: u64,

    /// Content type for objects that declare none
    #[arg(long, env = "GRIDSERVE_FALLBACK_CONTENT_TYPE", default_value = DEFAULT_CONTENT_TYPE)]
    pub fallback_content_type: String,

    /// Names answered 404 without a lookup (repeatable)
    #[arg(
        long = "exclude",
        env = "GRIDSERVE_EXCLUDE",
        value_delimiter = ',',
        default_value = "favicon.ico"
    )]
    pub exclude: Vec<String>,

    /// Create lookup indexes at startup
    #[arg(long, env = "GRIDSERVE_INDEX")]
    pub index: bool,

    /// Seconds a request may take to produce its response head
    #[arg(long, env = "GRIDSERVE_HEADER_TIMEOUT", default_value_t = 60)]
    pub header_timeout: u64,
}

/// Validated startup settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo: MongoConfig,
    pub grid: GridConfig,
    pub listen: String,
    pub workers: usize,
    pub ensure_indexes: bool,
    pub header_timeout: Duration,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, GridError> {
        let database = self
            .database
            .filter(|db| !db.trim().is_empty())
            .ok_or_else(|| {
                GridError::config("a database name is required (--database or GRIDSERVE_DATABASE)")
            })?;

        if self.cpucores == 0 {
            return Err(GridError::config("--cpucores must be at least 1"));
        }

        let mongo = match self.uri {
            Some(uri) => MongoConfig::new(uri, database),
            None => MongoConfig::from_host_port(&self.host, self.port, database),
        }
        .with_bucket(self.collection);
        mongo.validate()?;

        let grid = GridConfig::new()
            .with_buffer_size(self.buffer_size)
            .with_cache_max_age(self.cache_max_age)
            .with_fallback_content_type(self.fallback_content_type)
            .with_excluded_names(self.exclude.into_iter().filter(|n| !n.is_empty()));
        grid.validate()?;

        Ok(Settings {
            mongo,
            grid,
            listen: normalize_listen(&self.listen),
            workers: self.cpucores,
            ensure_indexes: self.index,
            header_timeout: Duration::from_secs(self.header_timeout),
        })
    }
}

/// `:8080` → `0.0.0.0:8080`
fn normalize_listen(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else {
        listen.to_string()
    }
}
