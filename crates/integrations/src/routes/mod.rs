//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                           - Liveness check
//! GET    /health/ready                     - Readiness check (database)
//!
//! # Platforms
//! GET    /platforms                        - Supported platform descriptors
//! GET    /platforms/{platform}/fields      - Connect-form fields
//!
//! # Connections (caller identified by x-user-id)
//! GET    /connections                      - List the caller's connections
//! POST   /connections                      - Connect a store
//! POST   /connections/sync                 - Bulk sync
//! GET    /connections/{id}                 - Connection detail
//! DELETE /connections/{id}                 - Disconnect
//! PUT    /connections/{id}/settings        - Replace sync settings
//! POST   /connections/{id}/sync            - Sync now
//! POST   /connections/{id}/test            - Test stored credentials
//! GET    /connections/{id}/history         - Recent sync runs
//! GET    /connections/{id}/stats           - Counts, history and success rate
//! GET    /connections/{id}/products        - Synced products
//! GET    /connections/{id}/orders          - Synced orders
//! GET    /connections/{id}/customers       - Synced customers
//!
//! # Webhooks (platform-signed)
//! POST   /webhooks/{platform}/{id}         - Inbound platform webhook
//! ```
//!
//! Handlers return the façade's JSON envelope; the status code follows the
//! envelope's outcome.

mod connections;
mod health;
mod platforms;
mod webhooks;

use axum::Router;
use serde::Deserialize;

use crate::state::AppState;

/// Default and maximum page size for list endpoints.
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 250;

/// `?limit=` for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

impl ListQuery {
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Every route, without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(platforms::router())
        .merge(connections::router())
        .merge(webhooks::router())
}
