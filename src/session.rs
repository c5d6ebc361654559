//! One tenant session: the public API a storefront or admin surface talks to.
//! Mutations commit locally first (write lock, durable cache write), then hand
//! a push-biased sync request to the engine. Reads never block on the network.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::cache::SnapshotCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{relay_topic, Role, SessionConfig};
use crate::directory::Directory;
use crate::engine::{StatusSnapshot, SyncEngine};
use crate::error::{StoreError, SyncError};
use crate::model::{
    new_id, order_totals, ActivityEntity, ActivityEntry, ActivityKind, BusinessData,
    DiscountMilestone, MenuItem, Order, OrderDraft, OrderStatus, RestaurantSettings,
    TenantAccount, TenantState,
};
use crate::notifier::{HttpRelay, LocalBus, Notifier, RelayEvent, WakeRelay};
use crate::store::http::HttpDocumentStore;
use crate::store::DocumentStore;

pub struct TenantSession {
    tenant_id: String,
    role: Role,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    cache: Arc<SnapshotCache>,
    directory: Arc<Directory>,
    state: Arc<RwLock<TenantState>>,
    engine: Arc<SyncEngine>,
    last_placed: std::sync::Mutex<Option<Order>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TenantSession {
    /// Production wiring: HTTP store, HTTP relay, on-disk cache, wall clock.
    pub async fn connect(
        tenant_id: impl Into<String>,
        role: Role,
        config: SessionConfig,
        cache_path: &Path,
    ) -> Result<Self, SyncError> {
        let store = Arc::new(HttpDocumentStore::new(
            config.store_base.clone(),
            config.request_timeout,
            config.retries,
            config.retry_backoff,
            config.rate_limit_backoff,
        )?);
        let relay = HttpRelay::new(config.relay_base.clone(), config.relay_reconnect);
        let cache = Arc::new(SnapshotCache::open(cache_path)?);
        Self::open(
            tenant_id,
            role,
            config,
            store,
            relay,
            LocalBus::new(),
            cache,
            Arc::new(SystemClock),
        )
        .await
    }

    /// Assembles a session from explicit parts. Tests and embedders share the
    /// store, relay, bus and clock across sessions to simulate devices.
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        tenant_id: impl Into<String>,
        role: Role,
        config: SessionConfig,
        store: Arc<dyn DocumentStore>,
        relay: Arc<dyn WakeRelay>,
        bus: LocalBus,
        cache: Arc<SnapshotCache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        let tenant_id = tenant_id.into();

        // Cache-first boot: the session is usable before any network call.
        let boot = match cache.load_state(&tenant_id)? {
            Some(state) => state,
            None => config.seed_state.clone().unwrap_or_default(),
        };
        let state = Arc::new(RwLock::new(boot));

        let directory = Arc::new(Directory::new(
            store.clone(),
            config.directory_handle.clone(),
            cache.clone(),
        ));
        let notifier = Arc::new(Notifier::new(relay, bus, relay_topic(&tenant_id)));

        let engine = SyncEngine::new(
            tenant_id.clone(),
            role,
            store,
            directory.clone(),
            cache.clone(),
            clock.clone(),
            notifier.clone(),
            state.clone(),
        );

        let mut tasks = vec![engine.spawn_worker()];

        // Periodic pull. The first tick fires immediately and doubles as the
        // boot sync.
        {
            let eng = engine.clone();
            let period = config.poll_interval;
            tasks.push(tokio::spawn(async move {
                let mut tick = tokio::time::interval(period);
                loop {
                    tick.tick().await;
                    eng.schedule_pull();
                }
            }));
        }

        // Relay wake-ups from other devices.
        {
            let eng = engine.clone();
            let mut events = notifier.subscribe_relay();
            tasks.push(tokio::spawn(async move {
                while let Some(ev) = events.recv().await {
                    match ev {
                        RelayEvent::Open => {
                            eng.status().set_live(true);
                            eng.schedule_pull();
                        }
                        RelayEvent::Ping => eng.schedule_pull(),
                        RelayEvent::Closed => eng.status().set_live(false),
                    }
                }
            }));
        }

        // Same-process sibling sessions on the shared bus.
        {
            let eng = engine.clone();
            let topic = notifier.topic().to_string();
            let mut bus_rx = notifier.subscribe_local();
            tasks.push(tokio::spawn(async move {
                loop {
                    match bus_rx.recv().await {
                        Ok(t) if t == topic => eng.schedule_pull(),
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                            eng.schedule_pull()
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        Ok(Self {
            tenant_id,
            role,
            config,
            clock,
            cache,
            directory,
            state,
            engine,
            last_placed: std::sync::Mutex::new(None),
            tasks,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Current local state, cloned. Never blocks on the network.
    pub async fn state(&self) -> TenantState {
        self.state.read().await.clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.engine.status().snapshot()
    }

    /// Runs one full sync attempt to completion. Push-biased for editing
    /// roles, so an admin's manual refresh defends local edits.
    pub async fn sync_now(&self) -> Result<(), SyncError> {
        self.engine.sync_now(self.role.can_edit()).await
    }

    fn require_edit(&self) -> Result<(), SyncError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(SyncError::NotPermitted)
        }
    }

    /// Configuration commit: mutate under the write lock, advance the version
    /// stamp, persist to the durable cache, then ask the engine to push.
    /// Failures past the local write never block the mutation.
    async fn commit<F>(&self, mutate: F)
    where
        F: FnOnce(&mut TenantState),
    {
        {
            let mut st = self.state.write().await;
            mutate(&mut st);
            st.last_update = self.clock.now();
            if let Err(e) = self.cache.save_state(&self.tenant_id, &st) {
                tracing::warn!(tenant = %self.tenant_id, error = %e, "cache write failed");
            }
        }
        self.engine.schedule_push();
    }

    /// Order commit: identical to [`commit`] except the document stamp stays
    /// put. Orders carry their own per-row stamps and the engine pushes them
    /// on its own; bumping the document stamp here would let an order tramp
    /// over a concurrent configuration edit.
    async fn commit_orders<F, T>(&self, mutate: F) -> T
    where
        F: FnOnce(&mut TenantState) -> T,
    {
        let out = {
            let mut st = self.state.write().await;
            let out = mutate(&mut st);
            if let Err(e) = self.cache.save_state(&self.tenant_id, &st) {
                tracing::warn!(tenant = %self.tenant_id, error = %e, "cache write failed");
            }
            out
        };
        self.engine.schedule_push();
        out
    }

    fn activity(&self, kind: ActivityKind, entity: ActivityEntity, description: String) -> ActivityEntry {
        ActivityEntry {
            id: new_id(),
            kind,
            entity,
            description,
            timestamp: self.clock.now(),
        }
    }

    /*──────── menu and categories ───────*/

    pub async fn add_menu_item(&self, item: MenuItem) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Create,
            ActivityEntity::MenuItem,
            format!("Added \"{}\"", item.name),
        );
        let cap = self.config.activity_log_cap;
        self.commit(move |st| {
            st.upsert_menu_item(item);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    pub async fn update_menu_item(&self, item: MenuItem) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Update,
            ActivityEntity::MenuItem,
            format!("Updated \"{}\"", item.name),
        );
        let cap = self.config.activity_log_cap;
        self.commit(move |st| {
            st.upsert_menu_item(item);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    pub async fn delete_menu_item(&self, id: &str) -> Result<bool, SyncError> {
        self.require_edit()?;
        let name = {
            let st = self.state.read().await;
            st.menu_items.iter().find(|i| i.id == id).map(|i| i.name.clone())
        };
        let Some(name) = name else { return Ok(false) };
        let entry = self.activity(
            ActivityKind::Delete,
            ActivityEntity::MenuItem,
            format!("Removed \"{name}\""),
        );
        let cap = self.config.activity_log_cap;
        let id = id.to_string();
        self.commit(move |st| {
            st.delete_menu_item(&id);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(true)
    }

    pub async fn add_category(&self, name: &str) -> Result<bool, SyncError> {
        self.require_edit()?;
        {
            let st = self.state.read().await;
            if st.categories.iter().any(|c| c == name) {
                return Ok(false);
            }
        }
        let entry = self.activity(
            ActivityKind::Create,
            ActivityEntity::Category,
            format!("Added category \"{name}\""),
        );
        let cap = self.config.activity_log_cap;
        let name = name.to_string();
        self.commit(move |st| {
            st.add_category(&name);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(true)
    }

    pub async fn remove_category(&self, name: &str) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Delete,
            ActivityEntity::Category,
            format!("Removed category \"{name}\" and its items"),
        );
        let cap = self.config.activity_log_cap;
        let name = name.to_string();
        self.commit(move |st| {
            st.remove_category(&name);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    pub async fn rename_category(&self, old: &str, new: &str) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Update,
            ActivityEntity::Category,
            format!("Renamed category \"{old}\" to \"{new}\""),
        );
        let cap = self.config.activity_log_cap;
        let (old, new) = (old.to_string(), new.to_string());
        self.commit(move |st| {
            st.rename_category(&old, &new);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    /*──────── settings and promotions ───────*/

    pub async fn update_settings(&self, settings: RestaurantSettings) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Update,
            ActivityEntity::Settings,
            "Updated restaurant settings".into(),
        );
        let cap = self.config.activity_log_cap;
        self.commit(move |st| {
            st.settings = Some(settings);
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    pub async fn update_discount_milestones(
        &self,
        milestones: Vec<DiscountMilestone>,
    ) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::Update,
            ActivityEntity::Promotion,
            "Updated discount milestones".into(),
        );
        let cap = self.config.activity_log_cap;
        self.commit(move |st| {
            st.discount_milestones = milestones;
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    pub async fn clear_activity_log(&self) -> Result<(), SyncError> {
        self.require_edit()?;
        self.commit(|st| st.activity_log.clear()).await;
        Ok(())
    }

    /*──────── orders ───────*/

    /// Places an order. Open to every role; the financial snapshot is frozen
    /// from the menu state visible at placement time.
    pub async fn place_order(&self, draft: OrderDraft) -> Order {
        let now = self.clock.now();
        let order = self.commit_orders(move |st| {
            let subtotal = draft.subtotal();
            let totals = order_totals(subtotal, &st.discount_milestones, &st.settings());
            let packing = if draft.is_takeaway {
                st.settings().packing_charge
            } else {
                0.0
            };
            let order = Order {
                id: new_id(),
                customer_name: draft.customer_name,
                table_no: draft.table_no,
                items: draft.items,
                subtotal: totals.subtotal,
                discount: totals.discount,
                tax_amount: totals.tax,
                packing_charge: packing,
                total: totals.total + packing,
                status: OrderStatus::Pending,
                timestamp: now,
                note: draft.note,
                is_takeaway: draft.is_takeaway,
            };
            st.orders.insert(0, order.clone());
            order
        })
        .await;
        *self.last_placed.lock().expect("poisoned") = Some(order.clone());
        order
    }

    /// The order most recently placed through this session, for the
    /// confirmation screen.
    pub fn last_placed_order(&self) -> Option<Order> {
        self.last_placed.lock().expect("poisoned").clone()
    }

    /// Moves an order through its lifecycle. The refreshed stamp makes this
    /// copy win the merge on every replica.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<(), SyncError> {
        self.require_edit()?;
        let now = self.clock.now();
        let order_id = order_id.to_string();
        self.commit_orders(move |st| {
            if let Some(o) = st.orders.iter_mut().find(|o| o.id == order_id) {
                o.status = status;
                o.timestamp = now;
            }
        })
        .await;
        Ok(())
    }

    pub async fn toggle_order_takeaway(&self, order_id: &str) -> Result<(), SyncError> {
        self.require_edit()?;
        let now = self.clock.now();
        let order_id = order_id.to_string();
        self.commit_orders(move |st| {
            let packing = st.settings().packing_charge;
            if let Some(o) = st.orders.iter_mut().find(|o| o.id == order_id) {
                o.is_takeaway = !o.is_takeaway;
                o.total -= o.packing_charge;
                o.packing_charge = if o.is_takeaway { packing } else { 0.0 };
                o.total += o.packing_charge;
                o.timestamp = now;
            }
        })
        .await;
        Ok(())
    }

    /*──────── import / export ───────*/

    pub async fn export_business_data(&self) -> BusinessData {
        let st = self.state.read().await;
        BusinessData {
            menu_items: Some(st.menu_items.clone()),
            categories: Some(st.categories.clone()),
            settings: st.settings.clone(),
            discount_milestones: Some(st.discount_milestones.clone()),
        }
    }

    /// Replaces only the sections present in the bundle.
    pub async fn import_business_data(&self, data: BusinessData) -> Result<(), SyncError> {
        self.require_edit()?;
        let entry = self.activity(
            ActivityKind::System,
            ActivityEntity::Settings,
            "Imported business data".into(),
        );
        let cap = self.config.activity_log_cap;
        self.commit(move |st| {
            if let Some(items) = data.menu_items {
                st.menu_items = items;
            }
            if let Some(categories) = data.categories {
                st.categories = categories;
            }
            if let Some(settings) = data.settings {
                st.settings = Some(settings);
            }
            if let Some(milestones) = data.discount_milestones {
                st.discount_milestones = milestones;
            }
            st.log_activity(entry, cap);
        })
        .await;
        Ok(())
    }

    /// Full tenant state as opaque JSON text, for backups.
    pub async fn export_state(&self) -> Result<String, SyncError> {
        let st = self.state.read().await;
        serde_json::to_string(&*st).map_err(|e| StoreError::Malformed(e.to_string()).into())
    }

    /// Restores a full-state backup, replacing everything including orders.
    /// Missing fields default, so older exports still load.
    pub async fn import_state(&self, json: &str) -> Result<(), SyncError> {
        self.require_edit()?;
        let imported: TenantState = serde_json::from_str(json)
            .map_err(|e| SyncError::from(StoreError::Malformed(e.to_string())))?;
        self.commit(move |st| *st = imported).await;
        Ok(())
    }

    /*──────── super-admin ───────*/

    fn require_super(&self) -> Result<(), SyncError> {
        if self.role.is_super() {
            Ok(())
        } else {
            Err(SyncError::NotPermitted)
        }
    }

    pub async fn list_tenants(&self) -> Result<Vec<TenantAccount>, SyncError> {
        self.require_super()?;
        self.directory.load_tenants().await
    }

    /// Registers a tenant account. The data document itself is provisioned
    /// lazily by the tenant's first syncing session.
    pub async fn add_tenant(&self, account: TenantAccount) -> Result<(), SyncError> {
        self.require_super()?;
        self.directory.register_tenant(account).await
    }

    /// Removes the account and the directory mapping. The data document is
    /// left behind in the remote store.
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<(), SyncError> {
        self.require_super()?;
        self.directory.deprovision_tenant(tenant_id).await
    }
}

impl Drop for TenantSession {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::model::CartItem;
    use crate::notifier::InMemRelay;
    use crate::store::inmem::InMemDocumentStore;
    use serde_json::json;

    const DIR: &str = "directory";

    struct Rig {
        store: Arc<InMemDocumentStore>,
        relay: Arc<InMemRelay>,
        bus: LocalBus,
        clock: Arc<MockClock>,
    }

    impl Rig {
        fn new() -> Self {
            let store = Arc::new(InMemDocumentStore::new());
            store.seed(DIR, json!({}));
            Self {
                store,
                relay: InMemRelay::new(),
                bus: LocalBus::new(),
                clock: Arc::new(MockClock::new(1_000)),
            }
        }

        async fn session(&self, tenant: &str, role: Role) -> TenantSession {
            let mut config = SessionConfig::default();
            config.directory_handle = DIR.into();
            TenantSession::open(
                tenant,
                role,
                config,
                self.store.clone(),
                self.relay.clone(),
                self.bus.clone(),
                Arc::new(SnapshotCache::in_memory().unwrap()),
                self.clock.clone(),
            )
            .await
            .unwrap()
        }
    }

    fn item(id: &str, name: &str, price: f64) -> MenuItem {
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

    fn cart(id: &str, price: f64, qty: u32) -> CartItem {
        CartItem {
            cart_id: format!("cart-{id}"),
            id: id.into(),
            name: id.to_uppercase(),
            price,
            category: "Mains".into(),
            quantity: qty,
            note: None,
            selected_options: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn customers_cannot_edit_the_menu() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Customer).await;
        let err = s.add_menu_item(item("m1", "Momo", 120.0)).await.unwrap_err();
        assert!(matches!(err, SyncError::NotPermitted));
        assert!(matches!(
            s.clear_activity_log().await.unwrap_err(),
            SyncError::NotPermitted
        ));
        assert!(matches!(
            s.list_tenants().await.unwrap_err(),
            SyncError::NotPermitted
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn menu_edit_logs_activity_and_bumps_stamp() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        rig.clock.set(5_000);
        s.add_menu_item(item("m1", "Momo", 120.0)).await.unwrap();

        let st = s.state().await;
        assert_eq!(st.menu_items.len(), 1);
        assert_eq!(st.last_update, 5_000);
        assert_eq!(st.activity_log.len(), 1);
        assert_eq!(st.activity_log[0].kind, ActivityKind::Create);
        assert!(st.activity_log[0].description.contains("Momo"));
    }

    #[tokio::test(start_paused = true)]
    async fn place_order_freezes_financials() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        s.update_discount_milestones(vec![DiscountMilestone {
            threshold: 500.0,
            percentage: 10.0,
        }])
        .await
        .unwrap();

        let draft = OrderDraft {
            customer_name: "Ravi".into(),
            table_no: Some("4".into()),
            items: vec![cart("m1", 300.0, 2)],
            note: None,
            is_takeaway: true,
        };
        let order = s.place_order(draft).await;

        assert_eq!(order.subtotal, 600.0);
        assert_eq!(order.discount, 60.0);
        // 5% GST on the discounted 540, default packing charge 20 on takeaway.
        assert_eq!(order.tax_amount, 27.0);
        assert_eq!(order.packing_charge, 20.0);
        assert_eq!(order.total, 587.0);
        assert_eq!(order.status, OrderStatus::Pending);

        let st = s.state().await;
        assert_eq!(st.orders[0].id, order.id);
    }

    #[tokio::test(start_paused = true)]
    async fn order_placement_does_not_bump_config_stamp() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        rig.clock.set(2_000);
        s.add_category("Drinks").await.unwrap();
        rig.clock.set(9_000);
        s.place_order(OrderDraft {
            customer_name: "Ravi".into(),
            items: vec![cart("m1", 100.0, 1)],
            ..OrderDraft::default()
        })
        .await;

        let st = s.state().await;
        assert_eq!(st.last_update, 2_000);
        assert_eq!(st.orders[0].timestamp, 9_000);
    }

    #[tokio::test(start_paused = true)]
    async fn status_update_refreshes_order_stamp() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        rig.clock.set(2_000);
        let order = s
            .place_order(OrderDraft {
                customer_name: "Ravi".into(),
                items: vec![cart("m1", 100.0, 1)],
                ..OrderDraft::default()
            })
            .await;

        rig.clock.set(3_000);
        s.update_order_status(&order.id, OrderStatus::Accepted)
            .await
            .unwrap();

        let st = s.state().await;
        assert_eq!(st.orders[0].status, OrderStatus::Accepted);
        assert_eq!(st.orders[0].timestamp, 3_000);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_takeaway_adjusts_totals() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        let order = s
            .place_order(OrderDraft {
                customer_name: "Ravi".into(),
                items: vec![cart("m1", 100.0, 1)],
                ..OrderDraft::default()
            })
            .await;
        assert_eq!(order.packing_charge, 0.0);
        let base_total = order.total;

        s.toggle_order_takeaway(&order.id).await.unwrap();
        let st = s.state().await;
        assert_eq!(st.orders[0].packing_charge, 20.0);
        assert_eq!(st.orders[0].total, base_total + 20.0);

        s.toggle_order_takeaway(&order.id).await.unwrap();
        let st = s.state().await;
        assert_eq!(st.orders[0].packing_charge, 0.0);
        assert_eq!(st.orders[0].total, base_total);
    }

    #[tokio::test(start_paused = true)]
    async fn import_applies_only_present_sections() {
        let rig = Rig::new();
        let s = rig.session("cafe-1", Role::Admin).await;
        s.add_category("Keep").await.unwrap();
        let mut settings = RestaurantSettings::default();
        settings.name = "Tiffin House".into();

        s.import_business_data(BusinessData {
            settings: Some(settings),
            ..BusinessData::default()
        })
        .await
        .unwrap();

        let st = s.state().await;
        assert_eq!(st.settings().name, "Tiffin House");
        assert_eq!(st.categories, vec!["Keep".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn export_round_trips_through_import() {
        let rig = Rig::new();
        let a = rig.session("cafe-1", Role::Admin).await;
        a.add_category("Mains").await.unwrap();
        a.add_menu_item(item("m1", "Momo", 120.0)).await.unwrap();
        let bundle = a.export_business_data().await;

        let b = rig.session("cafe-2", Role::Admin).await;
        b.import_business_data(bundle).await.unwrap();
        let st = b.state().await;
        assert_eq!(st.categories, vec!["Mains".to_string()]);
        assert_eq!(st.menu_items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_backup_round_trips_as_json_text() {
        let rig = Rig::new();
        let a = rig.session("cafe-1", Role::Admin).await;
        a.add_category("Mains").await.unwrap();
        a.place_order(OrderDraft {
            customer_name: "Ravi".into(),
            items: vec![cart("m1", 100.0, 1)],
            ..OrderDraft::default()
        })
        .await;
        let backup = a.export_state().await.unwrap();

        let b = rig.session("cafe-2", Role::Admin).await;
        b.import_state(&backup).await.unwrap();
        let restored = b.state().await;
        assert_eq!(restored.categories, vec!["Mains".to_string()]);
        assert_eq!(restored.orders.len(), 1);

        assert!(matches!(
            b.import_state("not json").await.unwrap_err(),
            SyncError::Store(crate::error::StoreError::Malformed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn super_admin_manages_tenants() {
        let rig = Rig::new();
        let s = rig.session("hq", Role::SuperAdmin).await;
        s.add_tenant(TenantAccount {
            id: "cafe-1".into(),
            name: "Cafe One".into(),
            owner_name: "Asha".into(),
            created_at: 1,
            status: crate::model::TenantStatus::Active,
        })
        .await
        .unwrap();

        assert_eq!(s.list_tenants().await.unwrap().len(), 1);
        s.delete_tenant("cafe-1").await.unwrap();
        assert!(s.list_tenants().await.unwrap().is_empty());
    }
}
