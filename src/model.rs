//! Domain model for one tenant: the full synchronized payload plus the pure
//! state operations the session and the convergence engine share.
//!
//! Wire names are camelCase and every field is defaulted, so partial remote
//! documents (older writers, hand-edited blobs) still deserialize.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationChoice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationOption {
    pub id: String,
    pub title: String,
    /// "single" or "multiple"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Vec<CustomizationChoice>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub customization_options: Vec<CustomizationOption>,
    #[serde(default)]
    pub is_chef_special: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_item_id: Option<String>,
}

/// Snapshot of a menu item inside an order. Orders never reference live menu
/// items, so later menu edits cannot rewrite history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub cart_id: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<CustomizationChoice>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_no: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub packing_charge: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: OrderStatus,
    /// Refreshed on every mutation; arbitrates conflicting copies.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub is_takeaway: bool,
}

/// Checkout input for a new order. Financial fields are derived at placement
/// time and frozen into the [`Order`].
#[derive(Clone, Debug, Default)]
pub struct OrderDraft {
    pub customer_name: String,
    pub table_no: Option<String>,
    pub items: Vec<CartItem>,
    pub note: Option<String>,
    pub is_takeaway: bool,
}

impl OrderDraft {
    pub fn subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|i| {
                let options: f64 = i.selected_options.iter().map(|o| o.price).sum();
                (i.price + options) * f64::from(i.quantity)
            })
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountMilestone {
    pub threshold: f64,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default)]
    pub gst_percentage: f64,
    #[serde(default)]
    pub packing_charge: f64,
    #[serde(default)]
    pub default_discount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_location: Option<String>,
}

impl Default for RestaurantSettings {
    fn default() -> Self {
        Self {
            name: "YOUR CAFE NAME".into(),
            tagline: "ADD YOUR TAGLINE".into(),
            logo: None,
            address: String::new(),
            phone: "+91 00000 00000".into(),
            gstin: None,
            gst_percentage: 5.0,
            packing_charge: 20.0,
            default_discount: 0.0,
            upi_id: None,
            upi_name: None,
            google_location: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityEntity {
    MenuItem,
    Category,
    Settings,
    Promotion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub entity: ActivityEntity,
    pub description: String,
    pub timestamp: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default = "default_tenant_status")]
    pub status: TenantStatus,
}

fn default_tenant_status() -> TenantStatus {
    TenantStatus::Active
}

/// Import/export bundle: the configuration half of the document, without
/// orders or the audit trail. Absent sections are left untouched on import.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_items: Option<Vec<MenuItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<RestaurantSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_milestones: Option<Vec<DiscountMilestone>>,
}

/// The full synchronized payload for one tenant. `last_update` is the version
/// stamp for the configuration half of the document; orders carry their own
/// per-row stamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantState {
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub discount_milestones: Vec<DiscountMilestone>,
    #[serde(default)]
    pub settings: Option<RestaurantSettings>,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
    #[serde(default)]
    pub last_update: u64,
}

impl TenantState {
    pub fn settings(&self) -> RestaurantSettings {
        self.settings.clone().unwrap_or_default()
    }

    pub fn order(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn upsert_menu_item(&mut self, item: MenuItem) {
        match self.menu_items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => *slot = item,
            None => self.menu_items.push(item),
        }
    }

    pub fn delete_menu_item(&mut self, id: &str) -> bool {
        let before = self.menu_items.len();
        self.menu_items.retain(|i| i.id != id);
        self.menu_items.len() != before
    }

    /// Adds a category unless the name is already present. Order of the list
    /// is display-meaningful, so new names go to the end.
    pub fn add_category(&mut self, name: &str) -> bool {
        if self.categories.iter().any(|c| c == name) {
            return false;
        }
        self.categories.push(name.to_string());
        true
    }

    /// Removes a category and every menu item referencing it. Cascade keeps
    /// the menu free of orphaned category references.
    pub fn remove_category(&mut self, name: &str) {
        self.categories.retain(|c| c != name);
        self.menu_items.retain(|i| i.category != name);
    }

    pub fn rename_category(&mut self, old: &str, new: &str) {
        for c in self.categories.iter_mut() {
            if c == old {
                *c = new.to_string();
            }
        }
        for i in self.menu_items.iter_mut() {
            if i.category == old {
                i.category = new.to_string();
            }
        }
    }

    /// Prepends an audit entry and trims to `cap` most recent.
    pub fn log_activity(&mut self, entry: ActivityEntry, cap: usize) {
        self.activity_log.insert(0, entry);
        self.activity_log.truncate(cap);
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Discount applicable to a cart subtotal, plus progress toward the next
/// milestone for the storefront nudge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscountQuote {
    pub percentage: f64,
    pub next_milestone: Option<DiscountMilestone>,
    pub remaining_to_next: f64,
}

/// Milestones are evaluated sorted ascending by threshold; the highest reached
/// one applies.
pub fn discount_for(subtotal: f64, milestones: &[DiscountMilestone]) -> DiscountQuote {
    let mut sorted: Vec<DiscountMilestone> = milestones.to_vec();
    sorted.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

    let mut percentage = 0.0;
    let mut next = None;
    for m in &sorted {
        if subtotal >= m.threshold {
            percentage = m.percentage;
        } else {
            next = Some(*m);
            break;
        }
    }
    let remaining = next.map_or(0.0, |m| (m.threshold - subtotal).max(0.0));
    DiscountQuote {
        percentage,
        next_milestone: next,
        remaining_to_next: remaining,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

/// Tax applies to the discounted amount, matching the storefront receipt.
pub fn order_totals(
    subtotal: f64,
    milestones: &[DiscountMilestone],
    settings: &RestaurantSettings,
) -> OrderTotals {
    let quote = discount_for(subtotal, milestones);
    let discount = subtotal * quote.percentage / 100.0;
    let taxable = subtotal - discount;
    let tax = taxable * settings.gst_percentage / 100.0;
    OrderTotals {
        subtotal,
        discount,
        tax,
        total: taxable + tax,
    }
}
