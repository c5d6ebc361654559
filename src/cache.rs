//! Local durable cache: one whole-snapshot row per tenant, plus the cached
//! remote handle. Read once at boot so the UI is usable before any network
//! activity; written after every committed local mutation. Durability is
//! best-effort; the remote store stays the cross-device source of truth.

use std::io::{Error, ErrorKind};
use std::path::Path;
use std::sync::Mutex;

use redb::{Database, ReadableTable, StorageBackend, TableDefinition};

use crate::error::SyncError;
use crate::model::TenantState;
use crate::store::DocHandle;

static CACHE_TABLE: TableDefinition<'static, &'static [u8], Vec<u8>> =
    TableDefinition::new("tenant_cache");

pub struct SnapshotCache {
    db: Database,
}

impl SnapshotCache {
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        let db = Database::create(path).map_err(|e| SyncError::Cache(e.to_string()))?;
        Self::init(db)
    }

    /// Volatile cache for tests and ephemeral sessions.
    pub fn in_memory() -> Result<Self, SyncError> {
        let db = Database::builder()
            .create_with_backend(MemoryBackend::new())
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, SyncError> {
        let txn = db
            .begin_write()
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        txn.open_table(CACHE_TABLE)
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        txn.commit().map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(Self { db })
    }

    // Keys are namespaced per tenant so several tenants can share one cache file.
    fn state_key(tenant_id: &str) -> Vec<u8> {
        format!("restaurant_data_v2_{tenant_id}").into_bytes()
    }
    fn handle_key(tenant_id: &str) -> Vec<u8> {
        format!("cloud_blob_{tenant_id}").into_bytes()
    }

    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), SyncError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        {
            let mut t = txn
                .open_table(CACHE_TABLE)
                .map_err(|e| SyncError::Cache(e.to_string()))?;
            t.insert(key, value)
                .map_err(|e| SyncError::Cache(e.to_string()))?;
        }
        txn.commit().map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SyncError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        let t = txn
            .open_table(CACHE_TABLE)
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        let got = t.get(key).map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(got.map(|v| v.value().to_vec()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), SyncError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| SyncError::Cache(e.to_string()))?;
        {
            let mut t = txn
                .open_table(CACHE_TABLE)
                .map_err(|e| SyncError::Cache(e.to_string()))?;
            t.remove(key).map_err(|e| SyncError::Cache(e.to_string()))?;
        }
        txn.commit().map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(())
    }

    pub fn save_state(&self, tenant_id: &str, state: &TenantState) -> Result<(), SyncError> {
        let bytes = serde_json::to_vec(state).map_err(|e| SyncError::Cache(e.to_string()))?;
        self.put(&Self::state_key(tenant_id), bytes)
    }

    /// A corrupt snapshot reads as empty; boot falls back to the seed.
    pub fn load_state(&self, tenant_id: &str) -> Result<Option<TenantState>, SyncError> {
        match self.get(&Self::state_key(tenant_id))? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => Ok(Some(state)),
                Err(e) => {
                    tracing::warn!(tenant = tenant_id, error = %e, "discarding unreadable cache snapshot");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn save_handle(&self, tenant_id: &str, handle: &DocHandle) -> Result<(), SyncError> {
        self.put(
            &Self::handle_key(tenant_id),
            handle.as_str().as_bytes().to_vec(),
        )
    }

    pub fn load_handle(&self, tenant_id: &str) -> Result<Option<DocHandle>, SyncError> {
        Ok(self
            .get(&Self::handle_key(tenant_id))?
            .and_then(|b| String::from_utf8(b).ok())
            .map(DocHandle))
    }

    pub fn clear_handle(&self, tenant_id: &str) -> Result<(), SyncError> {
        self.delete(&Self::handle_key(tenant_id))
    }
}

/// Growable, zero-filled in-memory redb backend. Sync is a no-op.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buf: Mutex<Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn len(&self) -> std::io::Result<u64> {
        Ok(self.buf.lock().unwrap().len() as u64)
    }

    fn read(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let b = self.buf.lock().unwrap();
        let off = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::Other, "offset too large"))?;
        let end = off
            .checked_add(len)
            .ok_or_else(|| Error::new(ErrorKind::Other, "length overflow"))?;
        if end > b.len() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "read past end"));
        }
        Ok(b[off..end].to_vec())
    }

    fn set_len(&self, len: u64) -> std::io::Result<()> {
        let mut b = self.buf.lock().unwrap();
        let new_len =
            usize::try_from(len).map_err(|_| Error::new(ErrorKind::Other, "len too large"))?;
        b.resize(new_len, 0);
        Ok(())
    }

    fn sync_data(&self, _eventual: bool) -> std::io::Result<()> {
        Ok(())
    }

    fn write(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        let mut b = self.buf.lock().unwrap();
        let off = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::Other, "offset too large"))?;
        let end = off
            .checked_add(data.len())
            .ok_or_else(|| Error::new(ErrorKind::Other, "length overflow"))?;
        if b.len() < end {
            b.resize(end, 0);
        }
        b[off..end].copy_from_slice(data);
        Ok(())
    }
}
