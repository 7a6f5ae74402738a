//! Platform descriptor handlers.

use axum::{
    Router,
    extract::{Path, State},
    response::Response,
    routing::get,
};

use crate::{error::envelope, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/platforms", get(list_platforms))
        .route("/platforms/{platform}/fields", get(form_fields))
}

async fn list_platforms(State(state): State<AppState>) -> Response {
    envelope(state.api().get_supported_platforms().await)
}

/// Unknown platform names come back as a failed envelope, not a 404 route miss.
async fn form_fields(State(state): State<AppState>, Path(platform): Path<String>) -> Response {
    envelope(state.api().get_platform_form_fields(&platform).await)
}
