use crate::reader::DEFAULT_BUFFER_SIZE;
use crate::{GridError, GridResult};

/// One month, in seconds
pub const DEFAULT_CACHE_MAX_AGE: u64 = 2_629_000;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Read-path policy, fixed once at startup
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Size of the single reusable buffer each open stream reads into
    pub buffer_size: usize,

    /// `max-age` advertised on full and not-modified responses
    pub cache_max_age: u64,

    /// Content type sent when the object declares none
    pub fallback_content_type: String,

    /// Well-known names answered as not found without a store lookup
    pub excluded_names: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            fallback_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            excluded_names: vec!["favicon.ico".to_string()],
        }
    }
}

impl GridConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-stream buffer size
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Set the advertised cache lifetime
    pub fn with_cache_max_age(mut self, secs: u64) -> Self {
        self.cache_max_age = secs;
        self
    }

    pub fn with_fallback_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.fallback_content_type = content_type.into();
        self
    }

    /// Replace the excluded name list
    pub fn with_excluded_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_names.iter().any(|n| n == name)
    }

    /// `Cache-Control` value for cacheable responses
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age)
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.buffer_size == 0 {
            return Err(GridError::config("buffer size must be greater than zero"));
        }
        if self.fallback_content_type.trim().is_empty() {
            return Err(GridError::config("fallback content type must not be empty"));
        }
        Ok(())
    }
}
