use std::time::Duration;

use crate::model::TenantState;

/// Capability level of the running session. Authentication itself is external;
/// callers hand the session the role they already verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
    pub fn is_super(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

/// Knobs for one tenant session. Defaults mirror the production deployment.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base URL of the JSON document store (POST create / GET read / PUT replace).
    pub store_base: String,
    /// Well-known handle of the shared directory document.
    pub directory_handle: String,
    /// Base URL of the pub/sub wake-up relay.
    pub relay_base: String,
    /// Per-request deadline on store calls.
    pub request_timeout: Duration,
    /// Retries on transient store failures, after the first try.
    pub retries: u32,
    /// Backoff before a generic transient retry.
    pub retry_backoff: Duration,
    /// Backoff before retrying a rate-limited call.
    pub rate_limit_backoff: Duration,
    /// Cadence of the periodic pull-biased sync.
    pub poll_interval: Duration,
    /// Delay before re-subscribing after the relay stream drops.
    pub relay_reconnect: Duration,
    /// Most recent audit entries kept per tenant.
    pub activity_log_cap: usize,
    /// State adopted on first boot when the durable cache is empty.
    pub seed_state: Option<TenantState>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_base: "https://jsonblob.com/api/jsonBlob".into(),
            directory_handle: "1344265415712161792".into(),
            relay_base: "https://ntfy.sh".into(),
            request_timeout: Duration::from_secs(10),
            retries: 2,
            retry_backoff: Duration::from_millis(1500),
            rate_limit_backoff: Duration::from_millis(2000),
            poll_interval: Duration::from_secs(30),
            relay_reconnect: Duration::from_secs(10),
            activity_log_cap: 50,
            seed_state: None,
        }
    }
}

/// Relay topic for a tenant. Deterministic so every session of the same tenant
/// lands on the same channel.
pub fn relay_topic(tenant_id: &str) -> String {
    format!("sync-live-v2-{tenant_id}")
}
