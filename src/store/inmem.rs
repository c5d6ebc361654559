use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{DocHandle, DocumentStore};

/// In-memory [`DocumentStore`] for tests. Share one instance between several
/// simulated clients to model the real shared backend; inject faults to model
/// outages and out-of-band deletions.
#[derive(Default)]
pub struct InMemDocumentStore {
    docs: Mutex<HashMap<String, Value>>,
    next_id: AtomicU64,
    /// Number of upcoming calls (any kind) that fail with `Unavailable`.
    fail_next: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    creates: AtomicU64,
}

impl InMemDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-place a document under a fixed handle (e.g. the directory).
    pub fn seed(&self, handle: &str, payload: Value) {
        self.docs
            .lock()
            .expect("poisoned")
            .insert(handle.to_string(), payload);
    }

    /// Simulate a document deleted out of band.
    pub fn remove(&self, handle: &str) {
        self.docs.lock().expect("poisoned").remove(handle);
    }

    pub fn document(&self, handle: &str) -> Option<Value> {
        self.docs.lock().expect("poisoned").get(handle).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.docs.lock().expect("poisoned").len()
    }

    /// The next `n` store calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    fn check_fault(&self) -> Result<(), StoreError> {
        let prev = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if prev > 0 {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemDocumentStore {
    async fn create_document(&self, payload: &Value) -> Result<DocHandle, StoreError> {
        self.check_fault()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = format!("doc-{id}");
        self.docs
            .lock()
            .expect("poisoned")
            .insert(handle.clone(), payload.clone());
        Ok(DocHandle(handle))
    }

    async fn read_document(&self, handle: &DocHandle) -> Result<Value, StoreError> {
        self.check_fault()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.docs
            .lock()
            .expect("poisoned")
            .get(handle.as_str())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn replace_document(
        &self,
        handle: &DocHandle,
        payload: &Value,
    ) -> Result<(), StoreError> {
        self.check_fault()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock().expect("poisoned");
        if !docs.contains_key(handle.as_str()) {
            return Err(StoreError::NotFound);
        }
        docs.insert(handle.as_str().to_string(), payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_read_replace_round_trip() {
        let store = InMemDocumentStore::new();
        let h = store.create_document(&json!({"a": 1})).await.unwrap();
        assert_eq!(store.read_document(&h).await.unwrap(), json!({"a": 1}));

        store.replace_document(&h, &json!({"a": 2})).await.unwrap();
        assert_eq!(store.read_document(&h).await.unwrap(), json!({"a": 2}));
    }

    #[tokio::test]
    async fn missing_handle_is_not_found() {
        let store = InMemDocumentStore::new();
        let err = store
            .read_document(&DocHandle("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let err = store
            .replace_document(&DocHandle("nope".into()), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn fault_injection_counts_down() {
        let store = InMemDocumentStore::new();
        let h = store.create_document(&json!({})).await.unwrap();
        store.fail_next(2);
        assert!(store.read_document(&h).await.is_err());
        assert!(store.read_document(&h).await.is_err());
        assert!(store.read_document(&h).await.is_ok());
    }
}
