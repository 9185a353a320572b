use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use ylab_core::api::{BatchPurchaseRequest, PurchaseRequest, UpdateProfileRequest, VoteRequest};
use ylab_core::rules::is_valid_email;
use ylab_core::api::PurchaseItem;
use ylab_core::{MarketError, PollId, Purchase, PurchaseId, TeamProfile, Vote};

use super::error::{storage_error, ApiResult};
use crate::auth::Principal;
use crate::notify::templates;
use crate::state::ServerState;
use crate::storage::StorageError;

#[derive(Debug, Default, Deserialize)]
pub struct TeamPurchaseQuery {
    #[serde(default)]
    pub needs_return: bool,
}

pub async fn get_profile(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<TeamProfile>> {
    let team = state.accounts.get_team(principal.id).await.map_err(storage_error)?;
    Ok(Json(team))
}

/// Change the team's contact address
pub async fn update_profile(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Json<TeamProfile>> {
    if !is_valid_email(&request.email) {
        return Err(storage_error(MarketError::InvalidEmail.into()));
    }

    let team = state
        .accounts
        .update_team_email(principal.id, &request.email)
        .await
        .map_err(storage_error)?;

    info!("Team {} updated its email", team.id);
    Ok(Json(team))
}

pub async fn list_purchases(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<TeamPurchaseQuery>,
) -> ApiResult<Json<Vec<Purchase>>> {
    let purchases = state
        .purchases
        .list_team_purchases(principal.id, query.needs_return)
        .await
        .map_err(storage_error)?;

    Ok(Json(purchases))
}

/// Order a single resource
pub async fn create_purchase(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<(StatusCode, Json<Purchase>)> {
    let item = PurchaseItem {
        resource_id: request.resource_id,
        quantity: request.quantity,
    };

    let receipt = state
        .purchases
        .create_purchase(principal.id, item)
        .await
        .map_err(storage_error)?;

    let purchase = receipt.purchases.into_iter().next().ok_or_else(|| {
        storage_error(StorageError::Corrupt("purchase insert returned no row".to_string()))
    })?;

    info!(
        "Team {} ordered {} x resource {} for {} credits",
        principal.id, purchase.quantity, purchase.resource_id, receipt.total_cost
    );

    state
        .notifier
        .notify(templates::purchase_received(&receipt.team, &purchase));

    Ok((StatusCode::CREATED, Json(purchase)))
}

/// Order several resources at once under one batch id
pub async fn create_batch_purchase(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BatchPurchaseRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Purchase>>)> {
    let receipt = state
        .purchases
        .create_batch(principal.id, &request.items, &request.comment)
        .await
        .map_err(storage_error)?;

    info!(
        "Team {} placed a batch of {} line(s) for {} credits",
        principal.id,
        receipt.purchases.len(),
        receipt.total_cost
    );

    state
        .notifier
        .notify(templates::batch_received(&receipt.team, &receipt.purchases));

    Ok((StatusCode::CREATED, Json(receipt.purchases)))
}

/// Hand a confirmed item back to the organisers
pub async fn return_purchase(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<PurchaseId>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state
        .purchases
        .return_purchase(principal.id, id)
        .await
        .map_err(storage_error)?;

    info!("Team {} returned purchase {}", principal.id, id);
    Ok(Json(purchase))
}

pub async fn list_votes(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Vote>>> {
    let votes = state
        .polls
        .list_team_votes(principal.id)
        .await
        .map_err(storage_error)?;

    Ok(Json(votes))
}

pub async fn cast_vote(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<(StatusCode, Json<Vote>)> {
    let vote = state
        .polls
        .cast_vote(principal.id, request)
        .await
        .map_err(storage_error)?;

    info!(
        "Team {} staked {} on '{}' in poll {}",
        principal.id, vote.credit_staked, vote.chosen_option, vote.poll_id
    );

    Ok((StatusCode::CREATED, Json(vote)))
}

pub async fn get_vote_for_poll(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(poll_id): Path<PollId>,
) -> ApiResult<Json<Vote>> {
    let vote = state
        .polls
        .get_team_vote(principal.id, poll_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(vote))
}
