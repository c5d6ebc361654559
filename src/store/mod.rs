pub mod http;
pub mod inmem;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Opaque locator for one remote document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocHandle(pub String);

impl DocHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stateless transport to the remote JSON document store. One opaque document
/// per handle; whole-document reads and replaces only, no field-level merge,
/// no locking. Implementations retry transient failures internally and must
/// surface `NotFound` distinctly so callers can fall back to re-discovery.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn create_document(&self, payload: &Value) -> Result<DocHandle, StoreError>;
    async fn read_document(&self, handle: &DocHandle) -> Result<Value, StoreError>;
    async fn replace_document(&self, handle: &DocHandle, payload: &Value)
        -> Result<(), StoreError>;
}
