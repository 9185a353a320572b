use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use ylab_core::{Resource, ResourceId, ResourceKind};

use super::error::{api_error, storage_error, ApiResult};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Active catalog, optionally narrowed to one category
pub async fn list_resources(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ResourceQuery>,
) -> ApiResult<Json<Vec<Resource>>> {
    let kind = match query.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => Some(ResourceKind::from_str(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "Invalid resource type", "INVALID_TYPE")
        })?),
        None => None,
    };

    let resources = state
        .catalog
        .list_resources(kind, false)
        .await
        .map_err(storage_error)?;

    Ok(Json(resources))
}

pub async fn get_resource(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<ResourceId>,
) -> ApiResult<Json<Resource>> {
    let resource = state.catalog.get_resource(id).await.map_err(storage_error)?;
    Ok(Json(resource))
}
