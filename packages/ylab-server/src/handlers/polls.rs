use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use ylab_core::api::PollResults;
use ylab_core::rules::poll_results;
use ylab_core::{Poll, PollId, PollStatus};

use super::error::{api_error, storage_error, ApiResult};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub status: Option<String>,
}

pub async fn list_polls(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PollQuery>,
) -> ApiResult<Json<Vec<Poll>>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(PollStatus::from_str(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "Invalid poll status", "INVALID_STATUS")
        })?),
        None => None,
    };

    let polls = state.polls.list_polls(status).await.map_err(storage_error)?;
    Ok(Json(polls))
}

pub async fn get_poll(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PollId>,
) -> ApiResult<Json<Poll>> {
    let poll = state.polls.get_poll(id).await.map_err(storage_error)?;
    Ok(Json(poll))
}

/// Vote count and staked credit per option
pub async fn get_poll_results(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PollId>,
) -> ApiResult<Json<PollResults>> {
    let poll = state.polls.get_poll(id).await.map_err(storage_error)?;
    let results = poll_results(poll.votes.as_deref().unwrap_or(&[]));

    Ok(Json(PollResults { poll, results }))
}
