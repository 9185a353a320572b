use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use ylab_core::api::{
    BatchActionRequest, BatchActionResponse, BatchActionResult, DecisionAction,
    PurchaseActionRequest, ToggleSlotRequest,
};
use ylab_core::{
    CompositionId, Purchase, PurchaseId, PurchaseStatus, TeamComposition, TeamId, TeamProfile,
};

use super::error::{api_error, storage_error, ApiResult};
use crate::notify::{templates, DecisionDigest};
use crate::state::ServerState;
use crate::storage::{Decision, PurchaseFilter};

#[derive(Debug, Default, Deserialize)]
pub struct AdminPurchaseQuery {
    pub status: Option<String>,
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub needs_return: bool,
}

pub async fn list_purchases(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<AdminPurchaseQuery>,
) -> ApiResult<Json<Vec<Purchase>>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(PurchaseStatus::from_str(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, "Invalid purchase status", "INVALID_STATUS")
        })?),
        None => None,
    };

    let filter = PurchaseFilter {
        status,
        team_id: query.team_id,
        needs_return: query.needs_return,
    };

    let purchases = state.purchases.list_purchases(filter).await.map_err(storage_error)?;
    Ok(Json(purchases))
}

pub async fn get_purchase(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PurchaseId>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state.purchases.get_purchase(id).await.map_err(storage_error)?;
    Ok(Json(purchase))
}

fn log_decision(id: PurchaseId, decision: &Decision) {
    info!(
        "Purchase {} is now '{}' (quantity {}, refund {})",
        id, decision.purchase.status, decision.purchase.quantity, decision.refund
    );
}

/// Confirm or cancel one pending purchase
pub async fn decide_purchase(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PurchaseId>,
    Json(request): Json<PurchaseActionRequest>,
) -> ApiResult<Json<Purchase>> {
    let decision = state
        .purchases
        .decide(id, request.action, None)
        .await
        .map_err(storage_error)?;

    log_decision(id, &decision);

    match &decision.purchase.team {
        Some(team) => {
            let email = match request.action {
                DecisionAction::Confirm => templates::purchase_confirmed(team, &decision.purchase),
                DecisionAction::Cancel => templates::purchase_refused(team, &decision.purchase),
            };
            state.notifier.notify(email);
        }
        None => warn!("Purchase {} has no team attached, skipping email", id),
    }

    Ok(Json(decision.purchase))
}

fn record(digests: &mut BTreeMap<TeamId, DecisionDigest>, team: &TeamProfile, decision: Decision) {
    let digest = digests
        .entry(team.id)
        .or_insert_with(|| DecisionDigest::new(team.clone()));

    match decision.purchase.status {
        PurchaseStatus::Confirmed if decision.adjusted => digest.adjusted.push(decision.purchase),
        PurchaseStatus::Confirmed => digest.confirmed.push(decision.purchase),
        PurchaseStatus::Cancelled => digest.refused.push(decision.purchase),
        PurchaseStatus::Pending => {}
    }
}

/// Decide many purchases. Each item commits on its own; one summary email per team.
pub async fn decide_batch(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchActionRequest>,
) -> ApiResult<Json<BatchActionResponse>> {
    if request.items.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Batch must contain at least one item",
            "EMPTY_BATCH",
        ));
    }

    let mut results = Vec::with_capacity(request.items.len());
    let mut digests: BTreeMap<TeamId, DecisionDigest> = BTreeMap::new();

    for item in request.items {
        let approved = match item.action {
            DecisionAction::Confirm => item.approved_quantity,
            DecisionAction::Cancel => None,
        };

        match state.purchases.decide(item.purchase_id, item.action, approved).await {
            Ok(decision) => {
                log_decision(item.purchase_id, &decision);
                results.push(BatchActionResult::succeeded(
                    item.purchase_id,
                    decision.purchase.status,
                    decision.purchase.quantity,
                ));
                if let Some(team) = decision.purchase.team.clone() {
                    record(&mut digests, &team, decision);
                }
            }
            Err(e) => {
                let (_, Json(body)) = storage_error(e);
                warn!("Purchase {} not processed: {}", item.purchase_id, body.error);
                results.push(BatchActionResult::failed(item.purchase_id, body.error));
            }
        }
    }

    for email in digests.values().filter_map(DecisionDigest::to_email) {
        state.notifier.notify(email);
    }

    let response = BatchActionResponse::from_results(results);
    info!(
        "Batch decision: {}/{} succeeded",
        response.success_count, response.total
    );

    Ok(Json(response))
}

/// Record that a confirmed item came back and tell the team
pub async fn mark_returned(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PurchaseId>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state.purchases.mark_returned(id).await.map_err(storage_error)?;

    info!("Purchase {} marked as returned", id);
    if let Some(team) = &purchase.team {
        state.notifier.notify(templates::return_processed(team, &purchase));
    }

    Ok(Json(purchase))
}

pub async fn unmark_returned(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<PurchaseId>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state.purchases.unmark_returned(id).await.map_err(storage_error)?;

    info!("Purchase {} no longer marked as returned", id);
    Ok(Json(purchase))
}

pub async fn list_teams(State(state): State<Arc<ServerState>>) -> ApiResult<Json<Vec<TeamProfile>>> {
    let teams = state.accounts.list_teams().await.map_err(storage_error)?;
    Ok(Json(teams))
}

pub async fn list_compositions(
    State(state): State<Arc<ServerState>>,
) -> ApiResult<Json<Vec<TeamComposition>>> {
    let compositions = state
        .compositions
        .list_compositions()
        .await
        .map_err(storage_error)?;

    Ok(Json(compositions))
}

pub async fn toggle_slot(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<CompositionId>,
    Json(request): Json<ToggleSlotRequest>,
) -> ApiResult<Json<TeamComposition>> {
    let composition = state
        .compositions
        .toggle_slot(id, request.department, request.action)
        .await
        .map_err(storage_error)?;

    Ok(Json(composition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn team(id: TeamId) -> TeamProfile {
        let now = Utc::now();
        TeamProfile {
            id,
            name: format!("team-{}", id),
            email: format!("team{}@ylab.fr", id),
            credit: 100,
            last_activity: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn decision(team_id: TeamId, status: PurchaseStatus, adjusted: bool) -> Decision {
        let now = Utc::now();
        Decision {
            purchase: Purchase {
                id: 1,
                batch_id: None,
                team_id,
                resource_id: 2,
                quantity: 1,
                requested_quantity: if adjusted { 3 } else { 1 },
                comment: String::new(),
                purchase_date: now,
                is_returned: false,
                needs_return: true,
                status,
                created_at: now,
                updated_at: now,
                resource: None,
                team: Some(team(team_id)),
            },
            refund: 0,
            adjusted,
        }
    }

    #[test]
    fn test_digests_group_by_team_and_outcome() {
        let mut digests = BTreeMap::new();
        record(&mut digests, &team(1), decision(1, PurchaseStatus::Confirmed, false));
        record(&mut digests, &team(1), decision(1, PurchaseStatus::Confirmed, true));
        record(&mut digests, &team(2), decision(2, PurchaseStatus::Cancelled, false));

        assert_eq!(digests.len(), 2);
        let first = &digests[&1];
        assert_eq!(first.confirmed.len(), 1);
        assert_eq!(first.adjusted.len(), 1);
        assert!(first.refused.is_empty());
        assert_eq!(digests[&2].refused.len(), 1);
    }
}
