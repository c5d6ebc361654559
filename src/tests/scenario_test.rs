//! Full-session scenarios: background tasks on, several sessions sharing one
//! simulated backend. Paused-time tests let the polling loops advance the
//! clock deterministically.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::cache::SnapshotCache;
use crate::clock::MockClock;
use crate::config::{Role, SessionConfig};
use crate::model::{CartItem, MenuItem, OrderDraft, TenantState};
use crate::notifier::{InMemRelay, LocalBus, WakeRelay};
use crate::session::TenantSession;
use crate::store::inmem::InMemDocumentStore;

const DIR: &str = "directory";
const TENANT: &str = "cafe-1";

struct Rig {
    store: Arc<InMemDocumentStore>,
    relay: Arc<InMemRelay>,
    clock: Arc<MockClock>,
}

impl Rig {
    fn new() -> Self {
        let store = Arc::new(InMemDocumentStore::new());
        store.seed(DIR, json!({}));
        Self {
            store,
            relay: InMemRelay::new(),
            clock: Arc::new(MockClock::new(1_000)),
        }
    }

    async fn session_with(
        &self,
        role: Role,
        relay: Arc<dyn WakeRelay>,
        bus: LocalBus,
        cache: Arc<SnapshotCache>,
    ) -> TenantSession {
        let mut config = SessionConfig::default();
        config.directory_handle = DIR.into();
        TenantSession::open(
            TENANT,
            role,
            config,
            self.store.clone(),
            relay,
            bus,
            cache,
            self.clock.clone(),
        )
        .await
        .unwrap()
    }

    async fn session(&self, role: Role) -> TenantSession {
        self.session_with(
            role,
            self.relay.clone(),
            LocalBus::new(),
            Arc::new(SnapshotCache::in_memory().unwrap()),
        )
        .await
    }

    /// Opens the first (admin) session and drives its initial sync so the
    /// remote document exists before anything else happens.
    async fn seeded_admin(&self) -> TenantSession {
        let a = self.session(Role::Admin).await;
        a.sync_now().await.unwrap();
        a
    }
}

/// Polls until `probe` passes; sleeping advances the paused runtime clock, so
/// timer-driven syncs fire along the way.
async fn eventually<F, Fut>(mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..240 {
        if probe().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("condition not reached in time");
}

fn menu_item(id: &str, name: &str, price: f64) -> MenuItem {
    MenuItem {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        price,
        category: "Mains".into(),
        image: String::new(),
        ingredients: vec![],
        calories: None,
        dietary_tags: vec![],
        customization_options: vec![],
        is_chef_special: false,
        suggested_item_id: None,
    }
}

#[tokio::test(start_paused = true)]
async fn wake_up_propagates_to_other_devices() {
    let rig = Rig::new();
    let a = rig.seeded_admin().await;
    let b = rig.session(Role::Customer).await;
    eventually(|| async { b.status().last_sync_time > 0 }).await;

    rig.clock.set(5_000);
    a.add_category("Specials").await.unwrap();

    // B hears the relay ping and pulls without waiting for its timer.
    eventually(|| async { b.state().await.categories == vec!["Specials".to_string()] }).await;
}

#[tokio::test(start_paused = true)]
async fn sibling_sessions_share_the_local_bus() {
    let rig = Rig::new();
    let bus = LocalBus::new();
    let a = rig
        .session_with(
            Role::Admin,
            rig.relay.clone(),
            bus.clone(),
            Arc::new(SnapshotCache::in_memory().unwrap()),
        )
        .await;
    a.sync_now().await.unwrap();

    // Same process, same bus, but a relay of its own: only the bus connects
    // the two.
    let b = rig
        .session_with(
            Role::Customer,
            InMemRelay::new(),
            bus.clone(),
            Arc::new(SnapshotCache::in_memory().unwrap()),
        )
        .await;
    eventually(|| async { b.status().last_sync_time > 0 }).await;

    rig.clock.set(5_000);
    a.add_menu_item(menu_item("m1", "Thali", 180.0)).await.unwrap();

    eventually(|| async { b.state().await.menu_items.len() == 1 }).await;
}

#[tokio::test(start_paused = true)]
async fn periodic_timer_converges_without_relay() {
    let rig = Rig::new();
    let a = rig.seeded_admin().await;

    // Own relay, own bus: the 30 second timer is the only link.
    let b = rig
        .session_with(
            Role::Customer,
            InMemRelay::new(),
            LocalBus::new(),
            Arc::new(SnapshotCache::in_memory().unwrap()),
        )
        .await;
    eventually(|| async { b.status().last_sync_time > 0 }).await;

    rig.clock.set(5_000);
    a.add_category("Lunch").await.unwrap();

    eventually(|| async { b.state().await.categories == vec!["Lunch".to_string()] }).await;
}

#[tokio::test(start_paused = true)]
async fn boot_is_served_from_cache_before_any_network() {
    let rig = Rig::new();
    let cache = Arc::new(SnapshotCache::in_memory().unwrap());
    {
        let a = rig
            .session_with(
                Role::Admin,
                rig.relay.clone(),
                LocalBus::new(),
                cache.clone(),
            )
            .await;
        a.add_category("Breakfast").await.unwrap();
    }

    // Total outage: the reopened session must still boot with data.
    rig.store.fail_next(u64::MAX);
    let b = rig
        .session_with(Role::Customer, rig.relay.clone(), LocalBus::new(), cache)
        .await;
    assert_eq!(b.state().await.categories, vec!["Breakfast".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn mutations_are_never_blocked_by_an_outage() {
    let rig = Rig::new();
    let a = rig.seeded_admin().await;
    rig.store.fail_next(u64::MAX);

    a.add_category("Dinner").await.unwrap();
    let order = a
        .place_order(OrderDraft {
            customer_name: "Ravi".into(),
            items: vec![CartItem {
                cart_id: "c1".into(),
                id: "m1".into(),
                name: "Thali".into(),
                price: 180.0,
                category: "Mains".into(),
                quantity: 1,
                note: None,
                selected_options: vec![],
            }],
            ..OrderDraft::default()
        })
        .await;

    let st = a.state().await;
    assert_eq!(st.categories, vec!["Dinner".to_string()]);
    assert_eq!(st.orders[0].id, order.id);
    assert!(a.sync_now().await.is_err());
    // The failure shows up in the ambient status, not as a blocked mutation.
    assert!(a.status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn fresh_device_adopts_existing_remote() {
    let rig = Rig::new();
    let mut remote = TenantState::default();
    remote.categories = vec!["Remote".into()];
    remote.last_update = 500;
    rig.store.seed("doc-9", serde_json::to_value(&remote).unwrap());
    rig.store.seed(DIR, json!({ TENANT: "doc-9" }));

    let s = rig.session(Role::Customer).await;
    eventually(|| async { s.state().await.categories == vec!["Remote".to_string()] }).await;
}

#[tokio::test(start_paused = true)]
async fn last_placed_order_is_remembered() {
    let rig = Rig::new();
    let s = rig.session(Role::Customer).await;
    assert!(s.last_placed_order().is_none());

    let order = s
        .place_order(OrderDraft {
            customer_name: "Mina".into(),
            ..OrderDraft::default()
        })
        .await;
    assert_eq!(s.last_placed_order().unwrap().id, order.id);
}
