use thiserror::Error;

/// Transport-level failures from the remote document store.
///
/// Transient classes are retried inside the store client; everything else is
/// surfaced as-is to the caller.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by remote store")]
    RateLimited,
    #[error("remote store unavailable")]
    Unavailable,
    #[error("network offline")]
    Offline,
    #[error("document not found")]
    NotFound,
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Classes worth an automatic retry at the transport layer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout
                | StoreError::RateLimited
                | StoreError::Unavailable
                | StoreError::Offline
        )
    }
}

/// Engine-level failures. Never surfaced as blocking errors on the mutation
/// path; they only feed the ambient sync status indicator.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("directory unreachable and no cached handle; sync deferred")]
    DirectoryUnavailable,
    #[error("durable cache error: {0}")]
    Cache(String),
    #[error("operation requires a privileged role")]
    NotPermitted,
}
