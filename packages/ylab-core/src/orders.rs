//! Order history views: batch grouping and summary counters.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::{Purchase, PurchaseStatus};

/// Status of a whole batch: the shared line status, or `mixte` when lines differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    #[serde(rename = "en attente")]
    Pending,
    #[serde(rename = "confirmé")]
    Confirmed,
    #[serde(rename = "annulé")]
    Cancelled,
    #[serde(rename = "mixte")]
    Mixed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "en attente",
            Self::Confirmed => "confirmé",
            Self::Cancelled => "annulé",
            Self::Mixed => "mixte",
        }
    }
}

impl From<PurchaseStatus> for BatchStatus {
    fn from(status: PurchaseStatus) -> Self {
        match status {
            PurchaseStatus::Pending => Self::Pending,
            PurchaseStatus::Confirmed => Self::Confirmed,
            PurchaseStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchGroup {
    pub batch_id: String,
    pub purchases: Vec<Purchase>,
    pub status: BatchStatus,
    pub total_items: i64,
    pub total_cost: i64,
    pub purchase_date: DateTime<Utc>,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
}

impl BatchGroup {
    fn new(batch_id: String, first: Purchase) -> Self {
        let mut group = Self {
            batch_id,
            status: first.status.into(),
            total_items: 0,
            total_cost: 0,
            purchase_date: first.purchase_date,
            comment: first.comment.clone(),
            team_name: first.team.as_ref().map(|t| t.name.clone()),
            purchases: Vec::new(),
        };
        group.push(first);
        group
    }

    /// Submission time encoded in the batch id, or the first line's date
    pub fn submitted_at(&self) -> DateTime<Utc> {
        parse_batch_date(&self.batch_id).unwrap_or(self.purchase_date)
    }

    fn push(&mut self, purchase: Purchase) {
        if BatchStatus::from(purchase.status) != self.status {
            self.status = BatchStatus::Mixed;
        }
        self.total_items += purchase.quantity;
        self.total_cost += purchase.line_cost();
        self.purchases.push(purchase);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OrderEntry {
    Batch(BatchGroup),
    Single(Purchase),
}

/// Group purchases by batch id, in order of first appearance. Purchases
/// without a batch stay as individual entries at their own position.
pub fn group_purchases(purchases: Vec<Purchase>) -> Vec<OrderEntry> {
    let mut entries: Vec<OrderEntry> = Vec::new();
    let mut batch_index: HashMap<String, usize> = HashMap::new();

    for purchase in purchases {
        let Some(batch_id) = purchase.batch_id.clone() else {
            entries.push(OrderEntry::Single(purchase));
            continue;
        };

        match batch_index.get(&batch_id) {
            Some(&index) => {
                if let OrderEntry::Batch(group) = &mut entries[index] {
                    group.push(purchase);
                }
            }
            None => {
                batch_index.insert(batch_id.clone(), entries.len());
                entries.push(OrderEntry::Batch(BatchGroup::new(batch_id, purchase)));
            }
        }
    }

    entries
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub needs_return: usize,
    pub total_spent: i64,
}

pub fn order_stats(purchases: &[Purchase]) -> OrderStats {
    let mut stats = OrderStats {
        total: purchases.len(),
        ..Default::default()
    };

    for purchase in purchases {
        match purchase.status {
            PurchaseStatus::Pending => stats.pending += 1,
            PurchaseStatus::Confirmed => {
                stats.confirmed += 1;
                stats.total_spent += purchase.line_cost();
            }
            PurchaseStatus::Cancelled => stats.cancelled += 1,
        }
        if purchase.awaiting_return() {
            stats.needs_return += 1;
        }
    }

    stats
}

/// Recover the submission time encoded in a batch id (`YYYYMMDDHHMMSS-team`)
pub fn parse_batch_date(batch_id: &str) -> Option<DateTime<Utc>> {
    let stamp = batch_id.split('-').next()?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Resource, ResourceKind, TeamProfile};

    fn purchase(id: i64, batch: Option<&str>, status: PurchaseStatus, quantity: i64) -> Purchase {
        let now = Utc::now();
        Purchase {
            id,
            batch_id: batch.map(str::to_string),
            team_id: 1,
            resource_id: id,
            quantity,
            requested_quantity: quantity,
            comment: format!("comment {}", id),
            purchase_date: now,
            is_returned: false,
            needs_return: true,
            status,
            created_at: now,
            updated_at: now,
            resource: Some(Resource {
                id,
                name: format!("R{}", id),
                description: String::new(),
                cost: 10,
                quantity: 5,
                max_per_team: 5,
                kind: ResourceKind::Hardware,
                image_url: String::new(),
                is_active: true,
                is_non_returnable: false,
                created_at: now,
                updated_at: now,
            }),
            team: Some(TeamProfile {
                id: 1,
                name: "Team A".to_string(),
                email: "a@ylab.fr".to_string(),
                credit: 1000,
                last_activity: None,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    #[test]
    fn test_grouping_preserves_first_appearance() {
        let entries = group_purchases(vec![
            purchase(1, Some("b1"), PurchaseStatus::Pending, 1),
            purchase(2, None, PurchaseStatus::Confirmed, 1),
            purchase(3, Some("b2"), PurchaseStatus::Pending, 2),
            purchase(4, Some("b1"), PurchaseStatus::Pending, 3),
        ]);

        assert_eq!(entries.len(), 3);
        match &entries[0] {
            OrderEntry::Batch(group) => {
                assert_eq!(group.batch_id, "b1");
                assert_eq!(group.purchases.len(), 2);
                assert_eq!(group.total_items, 4);
                assert_eq!(group.total_cost, 40);
                assert_eq!(group.status, BatchStatus::Pending);
                assert_eq!(group.comment, "comment 1");
                assert_eq!(group.team_name.as_deref(), Some("Team A"));
            }
            other => panic!("expected batch, got {:?}", other),
        }
        assert!(matches!(&entries[1], OrderEntry::Single(p) if p.id == 2));
        assert!(matches!(&entries[2], OrderEntry::Batch(g) if g.batch_id == "b2"));
    }

    #[test]
    fn test_mixed_status() {
        let entries = group_purchases(vec![
            purchase(1, Some("b1"), PurchaseStatus::Confirmed, 1),
            purchase(2, Some("b1"), PurchaseStatus::Cancelled, 1),
        ]);
        let OrderEntry::Batch(group) = &entries[0] else {
            panic!("expected batch");
        };
        assert_eq!(group.status, BatchStatus::Mixed);
        assert_eq!(group.status.as_str(), "mixte");
    }

    #[test]
    fn test_order_stats() {
        let mut returned = purchase(4, None, PurchaseStatus::Confirmed, 1);
        returned.is_returned = true;

        let stats = order_stats(&[
            purchase(1, Some("b1"), PurchaseStatus::Confirmed, 2),
            purchase(2, Some("b1"), PurchaseStatus::Pending, 1),
            purchase(3, None, PurchaseStatus::Cancelled, 1),
            returned,
        ]);

        assert_eq!(
            stats,
            OrderStats {
                total: 4,
                pending: 1,
                confirmed: 2,
                cancelled: 1,
                needs_return: 1,
                total_spent: 30,
            }
        );
    }

    #[test]
    fn test_parse_batch_date() {
        let date = parse_batch_date("20250314092653-42").unwrap();
        assert_eq!(date.to_rfc3339(), "2025-03-14T09:26:53+00:00");
        assert!(parse_batch_date("garbage").is_none());
    }

    #[test]
    fn test_batch_submitted_at() {
        let entries = group_purchases(vec![
            purchase(1, Some("20250314092653-42"), PurchaseStatus::Pending, 1),
            purchase(2, Some("b1"), PurchaseStatus::Pending, 1),
        ]);

        let OrderEntry::Batch(stamped) = &entries[0] else {
            panic!("expected batch");
        };
        assert_eq!(stamped.submitted_at().to_rfc3339(), "2025-03-14T09:26:53+00:00");

        let OrderEntry::Batch(legacy) = &entries[1] else {
            panic!("expected batch");
        };
        assert_eq!(legacy.submitted_at(), legacy.purchase_date);
    }
}
