//! Advisory cart checks run before a line is staged locally.
//!
//! The server re-validates everything on submission; these only spare the
//! team a round trip that would be refused anyway.

use serde::Serialize;

use crate::cart::Cart;
use crate::types::{Purchase, PurchaseStatus, Resource, ResourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartValidation {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity_allowed: Option<i64>,
}

impl CartValidation {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            max_quantity_allowed: None,
        }
    }

    fn rejected(error: String, max_quantity_allowed: Option<i64>) -> Self {
        Self {
            success: false,
            error: Some(error),
            max_quantity_allowed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourcePurchaseStats {
    pub purchased: i64,
    pub pending: i64,
    pub in_cart: i64,
    pub remaining_quota: i64,
}

fn sum_quantity<F>(resource_id: ResourceId, purchases: &[Purchase], keep: F) -> i64
where
    F: Fn(&Purchase) -> bool,
{
    purchases
        .iter()
        .filter(|p| p.resource_id == resource_id && !p.is_returned && keep(p))
        .map(|p| p.quantity)
        .sum()
}

/// Quantity counted against the team quota: confirmed or pending, not returned
pub fn committed_quantity(resource_id: ResourceId, purchases: &[Purchase]) -> i64 {
    sum_quantity(resource_id, purchases, |p| {
        matches!(p.status, PurchaseStatus::Confirmed | PurchaseStatus::Pending)
    })
}

pub fn validate_add_to_cart(
    resource: &Resource,
    requested: i64,
    purchases: &[Purchase],
    cart: &Cart,
) -> CartValidation {
    if !resource.is_active {
        return CartValidation::rejected("This resource is not available".to_string(), Some(0));
    }

    if requested <= 0 {
        return CartValidation::rejected("Quantity must be greater than 0".to_string(), None);
    }

    if resource.quantity < requested {
        return CartValidation::rejected(
            format!("Seulement {} article(s) disponible(s)", resource.quantity),
            Some(resource.quantity),
        );
    }

    let purchased = committed_quantity(resource.id, purchases);
    let in_cart = cart.quantity_of(resource.id);

    if purchased + in_cart + requested > resource.max_per_team {
        let remaining = (resource.max_per_team - purchased - in_cart).max(0);
        return CartValidation::rejected(
            format!(
                "Maximum {} par équipe. Vous avez {} acheté/en attente et {} dans le panier. Seulement {} de plus autorisés.",
                resource.max_per_team, purchased, in_cart, remaining
            ),
            Some(remaining),
        );
    }

    let max_by_stock = resource.quantity - in_cart;
    if requested > max_by_stock {
        return CartValidation::rejected(
            format!(
                "Seulement {} article(s) de plus peuvent être ajoutés au panier ({} déjà dans le panier)",
                max_by_stock, in_cart
            ),
            Some(max_by_stock),
        );
    }

    CartValidation::ok()
}

/// `min(max_per_team - purchased - in_cart, stock - in_cart)`, never negative
pub fn max_quantity_allowed(resource: &Resource, purchases: &[Purchase], cart: &Cart) -> i64 {
    if !resource.is_active {
        return 0;
    }
    let purchased = committed_quantity(resource.id, purchases);
    let in_cart = cart.quantity_of(resource.id);

    let by_quota = resource.max_per_team - purchased - in_cart;
    let by_stock = resource.quantity - in_cart;
    by_quota.min(by_stock).max(0)
}

pub fn purchase_stats(resource: &Resource, purchases: &[Purchase], cart: &Cart) -> ResourcePurchaseStats {
    ResourcePurchaseStats {
        purchased: sum_quantity(resource.id, purchases, |p| p.status == PurchaseStatus::Confirmed),
        pending: sum_quantity(resource.id, purchases, |p| p.status == PurchaseStatus::Pending),
        in_cart: cart.quantity_of(resource.id),
        remaining_quota: max_quantity_allowed(resource, purchases, cart),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use chrono::Utc;

    fn resource(stock: i64, max_per_team: i64) -> Resource {
        let now = Utc::now();
        Resource {
            id: 1,
            name: "GPU hours".to_string(),
            description: String::new(),
            cost: 25,
            quantity: stock,
            max_per_team,
            kind: ResourceKind::Service,
            image_url: String::new(),
            is_active: true,
            is_non_returnable: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn purchase(id: i64, status: PurchaseStatus, quantity: i64, returned: bool) -> Purchase {
        let now = Utc::now();
        Purchase {
            id,
            batch_id: None,
            team_id: 1,
            resource_id: 1,
            quantity,
            requested_quantity: quantity,
            comment: String::new(),
            purchase_date: now,
            is_returned: returned,
            needs_return: false,
            status,
            created_at: now,
            updated_at: now,
            resource: None,
            team: None,
        }
    }

    fn history() -> Vec<Purchase> {
        vec![
            purchase(1, PurchaseStatus::Confirmed, 1, false),
            purchase(2, PurchaseStatus::Pending, 1, false),
            purchase(3, PurchaseStatus::Cancelled, 4, false),
            purchase(4, PurchaseStatus::Confirmed, 2, true),
        ]
    }

    #[test]
    fn test_committed_ignores_cancelled_and_returned() {
        assert_eq!(committed_quantity(1, &history()), 2);
        assert_eq!(committed_quantity(2, &history()), 0);
    }

    #[test]
    fn test_inactive_and_non_positive() {
        let mut res = resource(10, 5);
        res.is_active = false;
        let v = validate_add_to_cart(&res, 1, &[], &Cart::new());
        assert!(!v.success);
        assert_eq!(v.error.as_deref(), Some("This resource is not available"));

        let v = validate_add_to_cart(&resource(10, 5), 0, &[], &Cart::new());
        assert_eq!(v.error.as_deref(), Some("Quantity must be greater than 0"));
        assert_eq!(v.max_quantity_allowed, None);
    }

    #[test]
    fn test_stock_limit() {
        let v = validate_add_to_cart(&resource(2, 5), 3, &[], &Cart::new());
        assert!(!v.success);
        assert_eq!(v.max_quantity_allowed, Some(2));
    }

    #[test]
    fn test_quota_counts_history_and_cart() {
        let res = resource(10, 4);
        let mut cart = Cart::new();
        cart.add_item(res.clone(), 1);

        // 2 committed + 1 in cart + 2 requested > 4
        let v = validate_add_to_cart(&res, 2, &history(), &cart);
        assert!(!v.success);
        assert_eq!(v.max_quantity_allowed, Some(1));
        assert!(v.error.unwrap().starts_with("Maximum 4 par équipe"));

        let v = validate_add_to_cart(&res, 1, &history(), &cart);
        assert!(v.success);
    }

    #[test]
    fn test_stock_minus_cart() {
        let res = resource(3, 10);
        let mut cart = Cart::new();
        cart.add_item(res.clone(), 2);

        let v = validate_add_to_cart(&res, 2, &[], &cart);
        assert!(!v.success);
        assert_eq!(v.max_quantity_allowed, Some(1));
        assert_eq!(
            v.error.as_deref(),
            Some("Seulement 1 article(s) de plus peuvent être ajoutés au panier (2 déjà dans le panier)")
        );
    }

    #[test]
    fn test_max_quantity_allowed() {
        let res = resource(10, 4);
        let mut cart = Cart::new();
        assert_eq!(max_quantity_allowed(&res, &history(), &cart), 2);

        cart.add_item(res.clone(), 1);
        assert_eq!(max_quantity_allowed(&res, &history(), &cart), 1);

        // Stock is the tighter bound
        let scarce = resource(1, 4);
        assert_eq!(max_quantity_allowed(&scarce, &[], &cart), 0);

        let mut inactive = resource(10, 4);
        inactive.is_active = false;
        assert_eq!(max_quantity_allowed(&inactive, &[], &Cart::new()), 0);
    }

    #[test]
    fn test_purchase_stats() {
        let res = resource(10, 6);
        let mut cart = Cart::new();
        cart.add_item(res.clone(), 2);

        let stats = purchase_stats(&res, &history(), &cart);
        assert_eq!(
            stats,
            ResourcePurchaseStats {
                purchased: 1,
                pending: 1,
                in_cart: 2,
                remaining_quota: 2,
            }
        );
    }
}
