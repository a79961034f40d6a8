use tracing::{debug, warn};

use crate::{CacheTag, GridError, StoreSession};

/// Outcome of checking an inbound cache tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// No tag supplied
    Absent,
    /// Tag did not parse; handled exactly like `Absent`
    Malformed,
    /// Tag parsed but does not match a current object
    Stale,
    /// Client copy is current; answer "not modified" without a body
    Fresh(CacheTag),
}

impl CacheDecision {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Decides fresh/stale/malformed with at most one existence query
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheValidator;

impl CacheValidator {
    pub fn new() -> Self {
        Self
    }

    pub async fn validate(&self, header: Option<&str>, session: &dyn StoreSession) -> CacheDecision {
        let Some(raw) = header else {
            return CacheDecision::Absent;
        };

        let tag = match CacheTag::parse(raw) {
            Ok(tag) => tag,
            Err(e) => {
                debug!(error = %e, "ignoring cache tag");
                return CacheDecision::Malformed;
            }
        };

        match session.exists_by_id_and_hash(&tag.id, &tag.hash).await {
            Ok(1) => CacheDecision::Fresh(tag),
            Ok(0) => CacheDecision::Stale,
            Ok(count) => {
                warn!(%tag, count, "cache tag matches several records, treating as stale");
                CacheDecision::Stale
            }
            Err(GridError::InvalidTag { message }) => {
                debug!(%tag, %message, "store rejected cache tag");
                CacheDecision::Malformed
            }
            Err(e) => {
                warn!(%tag, error = %e, "cache tag check failed, serving full object");
                CacheDecision::Stale
            }
        }
    }
}
