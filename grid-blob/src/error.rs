use thiserror::Error;

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;

/// Errors that can occur while resolving or streaming an object
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Object not found: {name}")]
    NotFound { name: String },

    #[error("Malformed cache tag: {message}")]
    InvalidTag { message: String },

    #[error("Object stream ended after {actual} of {expected} bytes")]
    Truncated { expected: u64, actual: u64 },

    #[error("Object stream produced more than the declared {expected} bytes")]
    Overrun { expected: u64 },

    #[error("Object stream already failed")]
    StreamFaulted,

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl GridError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a malformed tag error
    pub fn invalid_tag<S: Into<String>>(message: S) -> Self {
        Self::InvalidTag {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Routine outcomes that never escape the gateway as faults
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidTag { .. })
    }
}

impl From<mongodb::error::Error> for GridError {
    fn from(error: mongodb::error::Error) -> Self {
        Self::backend(error)
    }
}
