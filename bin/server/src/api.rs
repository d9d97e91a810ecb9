//! JSON API handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use kubebrowser_platform_access::{MaterializedKubeconfig, filter};
use serde::Serialize;
use tracing::debug;

use crate::app::AppState;
use crate::auth::Authenticated;
use crate::error::ApiError;

/// Response body of `GET /api/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub name: String,
}

/// Lists the kubeconfigs the caller may see, materialized with their own tokens.
pub async fn list_kubeconfigs(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Json<Vec<MaterializedKubeconfig>>, ApiError> {
    let identity = state
        .claims
        .extract(&auth.token)
        .map_err(|e| ApiError::InvalidClaims {
            details: e.to_string(),
        })?;

    let records = state
        .records
        .list(&state.settings.namespace, &state.settings.selector)
        .await
        .map_err(|e| ApiError::Records {
            details: e.to_string(),
        })?;

    let visible = filter::visible(records.iter().map(Arc::as_ref), &identity);
    let kubeconfigs = state.materializer.materialize_all(
        visible,
        auth.token.raw(),
        auth.refresh_token.as_deref(),
    );

    debug!(
        listed = records.len(),
        served = kubeconfigs.len(),
        "served kubeconfigs"
    );
    Ok(Json(kubeconfigs))
}

/// Returns the caller's display name.
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Json<MeResponse>, ApiError> {
    let identity = state
        .claims
        .extract(&auth.token)
        .map_err(|e| ApiError::InvalidClaims {
            details: e.to_string(),
        })?;

    Ok(Json(MeResponse {
        name: identity.display_name().to_string(),
    }))
}

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}
