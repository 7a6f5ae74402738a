//! Inbound platform webhooks.
//!
//! Deliveries are verified against the connection's stored secret; a valid
//! delivery queues a background sync of the connection.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::post,
};
use socialspark_core::{ConnectionId, PlatformType};

use crate::{error::envelope, state::AppState};

/// Signature headers, checked in order.
const SIGNATURE_HEADERS: [&str; 2] = ["x-shopify-hmac-sha256", "x-wc-webhook-signature"];

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/{platform}/{connection_id}", post(receive))
}

fn signature(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

async fn receive(
    State(state): State<AppState>,
    Path((platform, connection_id)): Path<(PlatformType, ConnectionId)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    envelope(
        state
            .api()
            .handle_webhook(platform, connection_id, &body, signature(&headers))
            .await,
    )
}
