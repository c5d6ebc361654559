pub mod cache;
pub mod clock;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod model;
pub mod notifier;
pub mod session;
pub mod store;

pub use config::{Role, SessionConfig};
pub use error::{StoreError, SyncError};
pub use session::TenantSession;

#[cfg(test)]
pub mod tests;
