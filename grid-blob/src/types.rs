use std::fmt;

use crate::{GridError, GridResult};

/// Separator between identity and content hash in a cache tag
pub const TAG_SEPARATOR: char = '_';

/// Stable identity of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `raw` can stand as the identity half of a cache tag.
    ///
    /// Visible ASCII only, and none of the separator, quote or list comma,
    /// so that a rendered tag always parses back to the same identity.
    pub fn is_well_formed(raw: &str) -> bool {
        !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_graphic() && c != TAG_SEPARATOR && c != '"' && c != ',')
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex digest of an object's content (MD5 in GridFS)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn from_string(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(raw: &str) -> bool {
        !raw.is_empty() && raw.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl From<&str> for ContentHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata record for one stored file. Read-only from the gateway's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub id: ObjectId,
    pub name: String,
    pub size: u64,
    pub content_hash: Option<ContentHash>,
    pub content_type: Option<String>,
}

impl ObjectMetadata {
    pub fn new<S: Into<String>>(id: ObjectId, name: S, size: u64) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            content_hash: None,
            content_type: None,
        }
    }

    pub fn with_content_hash(mut self, hash: ContentHash) -> Self {
        self.content_hash = Some(hash);
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Cache tag for the current state of this object.
    ///
    /// `None` without a hash, or when the identity or hash could not be parsed
    /// back from a client's `If-None-Match`.
    pub fn cache_tag(&self) -> Option<CacheTag> {
        let hash = self.content_hash.as_ref()?;
        if !ObjectId::is_well_formed(self.id.as_str()) || !ContentHash::is_well_formed(hash.as_str()) {
            return None;
        }
        Some(CacheTag::new(self.id.clone(), hash.clone()))
    }
}

/// `identity + "_" + contentHash`, as sent in `ETag` / `If-None-Match`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheTag {
    pub id: ObjectId,
    pub hash: ContentHash,
}

impl CacheTag {
    pub fn new(id: ObjectId, hash: ContentHash) -> Self {
        Self { id, hash }
    }

    /// Parse a raw header value.
    ///
    /// Surrounding whitespace and one pair of double quotes are ignored. The
    /// rest must split on [`TAG_SEPARATOR`] into exactly two components whose
    /// lexical forms are valid; anything else is [`GridError::InvalidTag`].
    pub fn parse(raw: &str) -> GridResult<Self> {
        let trimmed = raw.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        let mut parts = unquoted.split(TAG_SEPARATOR);
        let (id, hash) = match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(hash), None) => (id, hash),
            _ => {
                return Err(GridError::invalid_tag(format!(
                    "expected <id>{TAG_SEPARATOR}<hash>, got {raw:?}"
                )))
            }
        };

        if !ObjectId::is_well_formed(id) {
            return Err(GridError::invalid_tag(format!("bad identity {id:?}")));
        }
        if !ContentHash::is_well_formed(hash) {
            return Err(GridError::invalid_tag(format!("bad content hash {hash:?}")));
        }

        Ok(Self::new(ObjectId::from(id), ContentHash::from(hash)))
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id, TAG_SEPARATOR, self.hash)
    }
}
