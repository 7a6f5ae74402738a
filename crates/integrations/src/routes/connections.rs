//! Store connection handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Response,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::Value;
use socialspark_core::{ConnectionId, ConnectionSettings, SyncOptions, SyncType};
use tracing::instrument;

use super::ListQuery;
use crate::{
    error::{AppError, envelope},
    middleware::CurrentUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list).post(connect))
        .route("/connections/sync", post(bulk_sync))
        .route("/connections/{id}", get(show).delete(disconnect))
        .route("/connections/{id}/settings", put(update_settings))
        .route("/connections/{id}/sync", post(sync))
        .route("/connections/{id}/test", post(test))
        .route("/connections/{id}/history", get(history))
        .route("/connections/{id}/stats", get(stats))
        .route("/connections/{id}/products", get(products))
        .route("/connections/{id}/orders", get(orders))
        .route("/connections/{id}/customers", get(customers))
}

/// Body of `POST /connections`.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub platform: String,
    /// Platform-specific credential fields.
    pub credentials: Value,
    #[serde(default)]
    pub settings: Option<ConnectionSettings>,
}

/// Body of `POST /connections/{id}/sync`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncRequest {
    pub sync_types: Vec<SyncType>,
    pub limit: Option<u32>,
}

/// Body of `POST /connections/sync`.
#[derive(Debug, Deserialize)]
pub struct BulkSyncRequest {
    pub connection_ids: Vec<ConnectionId>,
    #[serde(default)]
    pub sync_types: Vec<SyncType>,
}

async fn list(CurrentUser(user_id): CurrentUser, State(state): State<AppState>) -> Response {
    envelope(state.api().get_user_connections(user_id).await)
}

#[instrument(skip_all, fields(%user_id))]
async fn connect(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    Ok(envelope(
        state
            .api()
            .connect_store(user_id, &body.platform, body.credentials, body.settings)
            .await,
    ))
}

async fn show(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> Response {
    envelope(state.api().get_connection(user_id, id).await)
}

async fn disconnect(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> Response {
    envelope(state.api().disconnect_store(user_id, id).await)
}

async fn update_settings(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    payload: Result<Json<ConnectionSettings>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(settings) = payload?;
    Ok(envelope(
        state
            .api()
            .update_connection_settings(user_id, id, settings)
            .await,
    ))
}

#[instrument(skip_all, fields(%user_id, connection_id = %id))]
async fn sync(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    payload: Option<Json<SyncRequest>>,
) -> Response {
    let Json(body) = payload.unwrap_or_default();
    let options = SyncOptions { limit: body.limit };
    envelope(
        state
            .api()
            .sync_store_data(user_id, id, &body.sync_types, options)
            .await,
    )
}

async fn bulk_sync(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<BulkSyncRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    Ok(envelope(
        state
            .api()
            .bulk_sync(user_id, body.connection_ids, &body.sync_types)
            .await,
    ))
}

async fn test(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> Response {
    envelope(state.api().test_connection(user_id, id).await)
}

async fn history(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Query(query): Query<ListQuery>,
) -> Response {
    envelope(
        state
            .api()
            .get_sync_history(user_id, id, query.limit())
            .await,
    )
}

async fn stats(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> Response {
    envelope(state.api().get_connection_stats(user_id, id).await)
}

async fn products(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Query(query): Query<ListQuery>,
) -> Response {
    envelope(
        state
            .api()
            .get_synced_products(user_id, id, query.limit())
            .await,
    )
}

async fn orders(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Query(query): Query<ListQuery>,
) -> Response {
    envelope(
        state
            .api()
            .get_synced_orders(user_id, id, query.limit())
            .await,
    )
}

async fn customers(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Query(query): Query<ListQuery>,
) -> Response {
    envelope(
        state
            .api()
            .get_synced_customers(user_id, id, query.limit())
            .await,
    )
}
