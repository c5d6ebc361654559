//! Convergence engine: the one authoritative resolve → pull → merge → push
//! pipeline. At most one attempt runs at a time per session; pull-biased
//! requests arriving while busy are dropped, mutation-triggered push requests
//! are coalesced into exactly one follow-up run. Failures never touch local
//! state; they only set the ambient status indicator and wait for the next
//! scheduled attempt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};

use crate::cache::SnapshotCache;
use crate::clock::Clock;
use crate::config::Role;
use crate::directory::Directory;
use crate::error::{StoreError, SyncError};
use crate::model::{Order, OrderStatus, TenantState};
use crate::notifier::Notifier;
use crate::store::DocumentStore;

/*──────── ambient status indicator ───────*/

#[derive(Default)]
pub struct SyncStatus {
    syncing: AtomicBool,
    live: AtomicBool,
    last_sync_time: AtomicU64,
    last_error: std::sync::Mutex<Option<String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub is_syncing: bool,
    pub is_live: bool,
    pub last_sync_time: u64,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_syncing: self.syncing.load(Ordering::SeqCst),
            is_live: self.live.load(Ordering::SeqCst),
            last_sync_time: self.last_sync_time.load(Ordering::SeqCst),
            last_error: self.last_error.lock().expect("poisoned").clone(),
        }
    }

    fn record(&self, result: &Result<(), SyncError>, now: u64) {
        let mut err = self.last_error.lock().expect("poisoned");
        match result {
            Ok(()) => {
                *err = None;
                self.last_sync_time.store(now, Ordering::SeqCst);
            }
            Err(e) => *err = Some(e.to_string()),
        }
    }
}

/*──────── merge algorithm ───────*/

#[derive(Debug, Default, PartialEq)]
pub(crate) struct MergeOutcome {
    /// Remote configuration was adopted wholesale.
    pub adopted_remote: bool,
    /// Order merge changed local state.
    pub orders_pulled: bool,
    /// Local holds orders the remote lacks, or newer copies of shared ones.
    pub orders_ahead: bool,
    pub needs_push: bool,
}

/// Orders merge independently of the config stamp: union of the two sets,
/// whole-order replace on conflict, last write wins by per-order timestamp.
/// On a stamp tie a status change beats a lingering Pending, so an accepted
/// or rejected order can never revert.
fn merge_orders(local: &mut Vec<Order>, remote: &[Order]) -> (bool, bool) {
    let mut pulled = false;
    for r in remote {
        match local.iter_mut().find(|l| l.id == r.id) {
            None => {
                local.push(r.clone());
                pulled = true;
            }
            Some(l) => {
                let newer = r.timestamp > l.timestamp;
                let tie_break = r.timestamp == l.timestamp
                    && r.status != l.status
                    && l.status == OrderStatus::Pending;
                if newer || tie_break {
                    *l = r.clone();
                    pulled = true;
                }
            }
        }
    }

    let ahead = local.iter().any(|l| match remote.iter().find(|r| r.id == l.id) {
        None => true,
        Some(r) => l.timestamp > r.timestamp || (l.timestamp == r.timestamp && l.status != r.status),
    });

    // Canonical ordering so converged replicas compare equal: newest first.
    local.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    (pulled, ahead)
}

pub(crate) fn merge_states(
    local: &mut TenantState,
    remote: &TenantState,
    force_push: bool,
    first_sync: bool,
) -> MergeOutcome {
    let (orders_pulled, orders_ahead) = merge_orders(&mut local.orders, &remote.orders);

    // Configuration is whole-document last-write-wins on the state stamp.
    let mut adopted_remote = false;
    if !force_push && (remote.last_update > local.last_update || first_sync) {
        local.menu_items = remote.menu_items.clone();
        local.categories = remote.categories.clone();
        local.settings = remote.settings.clone();
        local.discount_milestones = remote.discount_milestones.clone();
        local.activity_log = remote.activity_log.clone();
        local.last_update = remote.last_update;
        adopted_remote = true;
    }

    let needs_push = force_push || local.last_update > remote.last_update || orders_ahead;
    MergeOutcome {
        adopted_remote,
        orders_pulled,
        orders_ahead,
        needs_push,
    }
}

/*──────── the engine ───────*/

pub struct SyncEngine {
    tenant_id: String,
    role: Role,
    store: Arc<dyn DocumentStore>,
    directory: Arc<Directory>,
    cache: Arc<SnapshotCache>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    state: Arc<RwLock<TenantState>>,
    status: Arc<SyncStatus>,
    first_sync: AtomicBool,
    pending_push: AtomicBool,
    pending_pull: AtomicBool,
    wake: Notify,
    // One attempt at a time, shared by the worker and sync_now.
    gate: Mutex<()>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: String,
        role: Role,
        store: Arc<dyn DocumentStore>,
        directory: Arc<Directory>,
        cache: Arc<SnapshotCache>,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
        state: Arc<RwLock<TenantState>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tenant_id,
            role,
            store,
            directory,
            cache,
            clock,
            notifier,
            state,
            status: Arc::new(SyncStatus::default()),
            first_sync: AtomicBool::new(true),
            pending_push: AtomicBool::new(false),
            pending_pull: AtomicBool::new(false),
            wake: Notify::new(),
            gate: Mutex::new(()),
        })
    }

    pub fn status(&self) -> &Arc<SyncStatus> {
        &self.status
    }

    /// Pull-biased request (timer tick, wake-up ping). Dropped while an
    /// attempt is in flight; the in-flight pull covers it.
    pub fn schedule_pull(&self) {
        if self.status.is_syncing() {
            return;
        }
        self.pending_pull.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Push-biased request from a local mutation. Never silently lost: if an
    /// attempt is in flight, exactly one more runs after it.
    pub fn schedule_push(&self) {
        self.pending_push.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Runs one attempt to completion. Used by explicit manual refresh and by
    /// tests that need deterministic sequencing.
    pub async fn sync_now(&self, force_push: bool) -> Result<(), SyncError> {
        self.sync_once(force_push).await
    }

    pub fn spawn_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let eng = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                eng.wake.notified().await;
                loop {
                    let push = eng.pending_push.swap(false, Ordering::SeqCst);
                    let pull = eng.pending_pull.swap(false, Ordering::SeqCst);
                    if !push && !pull {
                        break;
                    }
                    let _ = eng.sync_once(push).await;
                }
            }
        })
    }

    async fn sync_once(&self, force_push: bool) -> Result<(), SyncError> {
        let _g = self.gate.lock().await;
        self.status.syncing.store(true, Ordering::SeqCst);
        let result = self.attempt(force_push).await;
        self.status.syncing.store(false, Ordering::SeqCst);
        if let Err(e) = &result {
            tracing::warn!(tenant = %self.tenant_id, error = %e, "sync attempt failed");
        } else {
            self.first_sync.store(false, Ordering::SeqCst);
        }
        self.status.record(&result, self.clock.now());
        result
    }

    async fn attempt(&self, force_push: bool) -> Result<(), SyncError> {
        let refresh = force_push || self.role.is_super();
        let handle = match self.directory.resolve(&self.tenant_id, refresh).await? {
            Some(h) => h,
            // Brand-new tenant: no handle anywhere yet.
            None => return self.provision().await,
        };

        let remote_value = match self.store.read_document(&handle).await {
            Ok(v) => v,
            Err(StoreError::NotFound) => {
                // Document deleted out of band: the handle is invalid, not the
                // tenant. Drop it and provision a fresh document.
                tracing::warn!(tenant = %self.tenant_id, %handle, "remote document vanished, reprovisioning");
                self.directory.forget(&self.tenant_id);
                return self.provision().await;
            }
            Err(e) => return Err(e.into()),
        };
        let remote: TenantState = serde_json::from_value(remote_value)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let first = self.first_sync.load(Ordering::SeqCst);
        let payload = {
            let mut local = self.state.write().await;
            let outcome = merge_states(&mut local, &remote, force_push, first);
            let payload = if outcome.needs_push {
                let stamp = if force_push {
                    self.clock.now()
                } else {
                    local.last_update.max(remote.last_update)
                };
                local.last_update = stamp;
                Some(
                    serde_json::to_value(&*local)
                        .map_err(|e| StoreError::Malformed(e.to_string()))?,
                )
            } else {
                None
            };
            if outcome.adopted_remote || outcome.orders_pulled || payload.is_some() {
                if let Err(e) = self.cache.save_state(&self.tenant_id, &local) {
                    tracing::warn!(tenant = %self.tenant_id, error = %e, "cache write failed");
                }
            }
            payload
        };

        if let Some(body) = payload {
            self.store.replace_document(&handle, &body).await?;
            tracing::debug!(tenant = %self.tenant_id, %handle, "pushed state");
            self.notifier.fan_out().await;
        }
        Ok(())
    }

    /// Creates a remote document seeded with current local state and writes
    /// the handle back into the directory. A concurrent provision for the
    /// same tenant leaves one of the two documents unreferenced; the
    /// directory mapping itself stays single-valued.
    async fn provision(&self) -> Result<(), SyncError> {
        let payload = {
            let mut local = self.state.write().await;
            local.last_update = self.clock.now();
            serde_json::to_value(&*local).map_err(|e| StoreError::Malformed(e.to_string()))?
        };
        let handle = self.store.create_document(&payload).await?;
        self.directory.register(&self.tenant_id, &handle).await?;
        {
            let local = self.state.read().await;
            if let Err(e) = self.cache.save_state(&self.tenant_id, &local) {
                tracing::warn!(tenant = %self.tenant_id, error = %e, "cache write failed");
            }
        }
        tracing::info!(tenant = %self.tenant_id, %handle, "provisioned remote document");
        self.notifier.fan_out().await;
        Ok(())
    }
}
