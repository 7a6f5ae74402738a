//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::StoreIntegrationApi;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    api: StoreIntegrationApi,
    /// `None` when running on the in-memory store.
    pool: Option<PgPool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api", &self.inner.api)
            .field("database", &self.inner.pool.is_some())
            .finish()
    }
}

impl AppState {
    #[must_use]
    pub fn new(api: StoreIntegrationApi, pool: Option<PgPool>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { api, pool }),
        }
    }

    #[must_use]
    pub fn api(&self) -> &StoreIntegrationApi {
        &self.inner.api
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
