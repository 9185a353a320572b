//! Authoritative ledger rules.
//!
//! Everything here is pure: callers load rows (under lock), ask these
//! functions what should happen, then persist the outcome.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::api::PurchaseItem;
use crate::error::{MarketError, Result};
use crate::types::{
    OptionTally, Poll, PollStatus, Purchase, PurchaseStatus, Resource, ResourceId, TeamId, Vote,
};

pub const MIN_COMMENT_LENGTH: usize = 10;
pub const MAX_COMMENT_LENGTH: usize = 3000;
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validate one purchase line and return its cost.
///
/// `already_confirmed` is the team's confirmed, non-returned quantity of this
/// resource.
pub fn check_purchase_line(resource: &Resource, already_confirmed: i64, quantity: i64) -> Result<i64> {
    if quantity < 1 {
        return Err(MarketError::InvalidQuantity);
    }
    if !resource.is_active {
        return Err(MarketError::ResourceUnavailable);
    }
    if resource.quantity < quantity {
        return Err(MarketError::InsufficientQuantity);
    }
    if already_confirmed + quantity > resource.max_per_team {
        return Err(MarketError::QuotaExceeded(resource.name.clone()));
    }
    Ok(resource.cost * quantity)
}

pub fn check_credit(credit: i64, cost: i64) -> Result<()> {
    if credit < cost {
        return Err(MarketError::InsufficientCredit);
    }
    Ok(())
}

pub fn validate_batch_comment(comment: &str) -> Result<()> {
    let length = comment.trim().chars().count();
    if length < MIN_COMMENT_LENGTH {
        return Err(MarketError::CommentTooShort(MIN_COMMENT_LENGTH));
    }
    if length > MAX_COMMENT_LENGTH {
        return Err(MarketError::CommentTooLong);
    }
    Ok(())
}

/// Merge a batch request into one line per resource, keeping first-seen order.
pub fn merge_batch_items(items: &[PurchaseItem]) -> Result<Vec<PurchaseItem>> {
    if items.is_empty() {
        return Err(MarketError::EmptyBatch);
    }

    let mut merged: Vec<PurchaseItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(MarketError::InvalidQuantity);
        }
        match merged.iter_mut().find(|m| m.resource_id == item.resource_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(MarketError::InvalidQuantity)?
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

/// One validated batch line, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub cost: i64,
    pub needs_return: bool,
}

/// Price a whole batch against the team's credit. Fails on the first bad
/// line, so nothing is written for a partially valid batch.
pub fn price_batch<'a, I>(lines: I, credit: i64) -> Result<(Vec<PricedLine>, i64)>
where
    I: IntoIterator<Item = (&'a Resource, i64, i64)>,
{
    let mut priced = Vec::new();
    let mut total = 0;

    for (resource, already_confirmed, quantity) in lines {
        let cost = check_purchase_line(resource, already_confirmed, quantity)?;
        total += cost;
        priced.push(PricedLine {
            resource_id: resource.id,
            quantity,
            cost,
            needs_return: !resource.is_non_returnable,
        });
    }

    check_credit(credit, total)?;
    Ok((priced, total))
}

/// Batch identifier: UTC timestamp plus team id
pub fn batch_id(now: DateTime<Utc>, team_id: TeamId) -> String {
    format!("{}-{}", now.format("%Y%m%d%H%M%S"), team_id)
}

/// Outcome of confirming a pending purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalPlan {
    /// Quantity granted after approval
    pub quantity: i64,
    /// Credit handed back to the team
    pub refund: i64,
    /// Stock left on the resource
    pub stock_after: i64,
    /// Granted quantity differs from what the team asked for
    pub adjusted: bool,
}

pub fn plan_approval(
    purchase: &Purchase,
    unit_cost: i64,
    stock: i64,
    approved_quantity: Option<i64>,
) -> Result<ApprovalPlan> {
    if purchase.status != PurchaseStatus::Pending {
        return Err(MarketError::AlreadyProcessed);
    }

    let mut quantity = purchase.quantity;
    let mut refund = 0;

    if let Some(approved) = approved_quantity.filter(|q| *q != purchase.quantity) {
        if approved < 1 || approved > purchase.requested_quantity {
            return Err(MarketError::InvalidApprovedQuantity);
        }
        if approved < purchase.quantity {
            refund = (purchase.quantity - approved) * unit_cost;
        }
        quantity = approved;
    }

    if stock < quantity {
        return Err(MarketError::InsufficientStock);
    }

    Ok(ApprovalPlan {
        quantity,
        refund,
        stock_after: stock - quantity,
        adjusted: quantity != purchase.requested_quantity,
    })
}

/// Credit returned when a pending purchase is refused
pub fn plan_cancellation(purchase: &Purchase, unit_cost: i64) -> Result<i64> {
    if purchase.status != PurchaseStatus::Pending {
        return Err(MarketError::AlreadyProcessed);
    }
    Ok(unit_cost * purchase.quantity)
}

/// A team handing an item back. Stock is restored; credit is not.
pub fn check_team_return(purchase: &Purchase, team_id: TeamId, resource: &Resource) -> Result<()> {
    if purchase.team_id != team_id {
        return Err(MarketError::NotOwner);
    }
    if purchase.is_returned {
        return Err(MarketError::AlreadyReturned);
    }
    if purchase.status != PurchaseStatus::Confirmed {
        return Err(MarketError::ReturnRequiresConfirmed);
    }
    if resource.is_non_returnable {
        return Err(MarketError::NonReturnable);
    }
    Ok(())
}

pub fn check_mark_returned(purchase: &Purchase) -> Result<()> {
    if purchase.status != PurchaseStatus::Confirmed {
        return Err(MarketError::MarkRequiresConfirmed);
    }
    if purchase.is_returned {
        return Err(MarketError::AlreadyMarkedReturned);
    }
    Ok(())
}

pub fn check_unmark_returned(purchase: &Purchase) -> Result<()> {
    if !purchase.is_returned {
        return Err(MarketError::NotMarkedReturned);
    }
    Ok(())
}

pub fn check_vote(
    poll: &Poll,
    option: &str,
    stake: i64,
    credit: i64,
    already_voted: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if poll.status != PollStatus::Open {
        return Err(MarketError::PollClosed);
    }
    if now < poll.start_date || now > poll.end_date {
        return Err(MarketError::PollInactive);
    }
    if !poll.options.iter().any(|o| o == option) {
        return Err(MarketError::InvalidOption);
    }
    if already_voted {
        return Err(MarketError::AlreadyVoted);
    }
    if stake < 1 {
        return Err(MarketError::InvalidStake);
    }
    check_credit(credit, stake)
}

pub fn poll_results(votes: &[Vote]) -> BTreeMap<String, OptionTally> {
    let mut results: BTreeMap<String, OptionTally> = BTreeMap::new();
    for vote in votes {
        let tally = results.entry(vote.chosen_option.clone()).or_default();
        tally.count += 1;
        tally.total_credits += vote.credit_staked;
    }
    results
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && domain.contains('.')
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
