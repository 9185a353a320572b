use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use ylab_core::api::{DecisionAction, PurchaseItem};
use ylab_core::rules;
use ylab_core::{Purchase, PurchaseId, PurchaseStatus, Resource, ResourceId, TeamId, TeamProfile};

use super::rows::{
    purchase_from_row, resource_from_row, team_from_row, PURCHASE_SELECT, RESOURCE_COLUMNS,
    TEAM_COLUMNS,
};
use super::traits::{
    Decision, PurchaseFilter, PurchaseReceipt, PurchaseStore, StorageError, StorageResult,
};

/// PostgreSQL implementation of PurchaseStore.
///
/// Rows are locked in a fixed order (team, resource, purchase) so that
/// concurrent orders and decisions cannot deadlock each other.
pub struct PostgresPurchaseStore {
    pool: PgPool,
}

impl PostgresPurchaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for purchases. Needs teams and resources.
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS purchases (
                id BIGSERIAL PRIMARY KEY,
                batch_id VARCHAR(64),
                team_id BIGINT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                resource_id BIGINT NOT NULL REFERENCES resources(id),
                quantity BIGINT NOT NULL CHECK (quantity >= 1),
                requested_quantity BIGINT NOT NULL CHECK (requested_quantity >= quantity),
                comment TEXT NOT NULL DEFAULT '',
                purchase_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                is_returned BOOLEAN NOT NULL DEFAULT FALSE,
                needs_return BOOLEAN NOT NULL DEFAULT TRUE,
                status VARCHAR(20) NOT NULL DEFAULT 'en attente',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchases_team ON purchases(team_id, resource_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchases_status ON purchases(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_purchases_batch ON purchases(batch_id) WHERE batch_id IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// A purchase line about to be written
struct LineInsert<'a> {
    batch_id: Option<&'a str>,
    team_id: TeamId,
    resource_id: ResourceId,
    quantity: i64,
    comment: &'a str,
    needs_return: bool,
}

async fn lock_team(conn: &mut PgConnection, id: TeamId) -> StorageResult<TeamProfile> {
    let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = $1 FOR UPDATE", TEAM_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StorageError::TeamNotFound)?;

    team_from_row(&row, "")
}

async fn lock_resource(conn: &mut PgConnection, id: ResourceId) -> StorageResult<Resource> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM resources WHERE id = $1 FOR UPDATE",
        RESOURCE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StorageError::ResourceNotFound)?;

    resource_from_row(&row, "")
}

/// Lock several resources in ascending id order
async fn lock_resources(
    conn: &mut PgConnection,
    ids: &[ResourceId],
) -> StorageResult<HashMap<ResourceId, Resource>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM resources WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        RESOURCE_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| resource_from_row(row, "").map(|r| (r.id, r)))
        .collect()
}

async fn lock_purchase(conn: &mut PgConnection, id: PurchaseId) -> StorageResult<Purchase> {
    let row = sqlx::query(&format!("{} WHERE p.id = $1 FOR UPDATE OF p", PURCHASE_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StorageError::PurchaseNotFound)?;

    purchase_from_row(&row, true)
}

/// Owner and resource of a purchase, read without locking. Both never change.
async fn purchase_keys(conn: &mut PgConnection, id: PurchaseId) -> StorageResult<(TeamId, ResourceId)> {
    let row = sqlx::query("SELECT team_id, resource_id FROM purchases WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StorageError::PurchaseNotFound)?;

    Ok((row.try_get("team_id")?, row.try_get("resource_id")?))
}

/// Quantity of a resource the team holds: confirmed and not handed back
async fn confirmed_quantity(
    conn: &mut PgConnection,
    team_id: TeamId,
    resource_id: ResourceId,
) -> StorageResult<i64> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(quantity), 0)::BIGINT AS held
        FROM purchases
        WHERE team_id = $1 AND resource_id = $2 AND status = $3 AND NOT is_returned
        "#,
    )
    .bind(team_id)
    .bind(resource_id)
    .bind(PurchaseStatus::Confirmed.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("held")?)
}

async fn adjust_credit(conn: &mut PgConnection, team_id: TeamId, delta: i64) -> StorageResult<TeamProfile> {
    let row = sqlx::query(&format!(
        "UPDATE teams SET credit = credit + $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
        TEAM_COLUMNS
    ))
    .bind(delta)
    .bind(team_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StorageError::TeamNotFound)?;

    team_from_row(&row, "")
}

async fn insert_line(conn: &mut PgConnection, line: LineInsert<'_>) -> StorageResult<PurchaseId> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        INSERT INTO purchases
            (batch_id, team_id, resource_id, quantity, requested_quantity, comment,
             purchase_date, is_returned, needs_return, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4, $5, $6, FALSE, $7, $8, $6, $6)
        RETURNING id
        "#,
    )
    .bind(line.batch_id)
    .bind(line.team_id)
    .bind(line.resource_id)
    .bind(line.quantity)
    .bind(line.comment)
    .bind(now)
    .bind(line.needs_return)
    .bind(PurchaseStatus::Pending.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("id")?)
}

async fn fetch_purchases(conn: &mut PgConnection, ids: &[PurchaseId]) -> StorageResult<Vec<Purchase>> {
    let rows = sqlx::query(&format!("{} WHERE p.id = ANY($1) ORDER BY p.id", PURCHASE_SELECT))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(|row| purchase_from_row(row, true)).collect()
}

#[async_trait]
impl PurchaseStore for PostgresPurchaseStore {
    async fn list_team_purchases(&self, team_id: TeamId, needs_return: bool) -> StorageResult<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            r#"
            {}
            WHERE p.team_id = $1
              AND (NOT $2 OR (p.needs_return AND p.status = $3 AND NOT p.is_returned))
            ORDER BY p.purchase_date DESC, p.id DESC
            "#,
            PURCHASE_SELECT
        ))
        .bind(team_id)
        .bind(needs_return)
        .bind(PurchaseStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| purchase_from_row(row, false)).collect()
    }

    async fn list_purchases(&self, filter: PurchaseFilter) -> StorageResult<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            r#"
            {}
            WHERE ($1::TEXT IS NULL OR p.status = $1)
              AND ($2::BIGINT IS NULL OR p.team_id = $2)
              AND (NOT $3 OR (p.needs_return AND p.status = $4 AND NOT p.is_returned))
            ORDER BY p.purchase_date DESC, p.id DESC
            "#,
            PURCHASE_SELECT
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.team_id)
        .bind(filter.needs_return)
        .bind(PurchaseStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| purchase_from_row(row, true)).collect()
    }

    async fn get_purchase(&self, id: PurchaseId) -> StorageResult<Purchase> {
        let row = sqlx::query(&format!("{} WHERE p.id = $1", PURCHASE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::PurchaseNotFound)?;

        purchase_from_row(&row, true)
    }

    async fn create_purchase(&self, team_id: TeamId, item: PurchaseItem) -> StorageResult<PurchaseReceipt> {
        if item.quantity < 1 {
            return Err(ylab_core::MarketError::InvalidQuantity.into());
        }

        let mut tx = self.pool.begin().await?;

        let team = lock_team(&mut tx, team_id).await?;
        let resource = lock_resource(&mut tx, item.resource_id).await?;
        let held = confirmed_quantity(&mut tx, team_id, resource.id).await?;

        let cost = rules::check_purchase_line(&resource, held, item.quantity)?;
        rules::check_credit(team.credit, cost)?;

        let team = adjust_credit(&mut tx, team_id, -cost).await?;
        let id = insert_line(
            &mut tx,
            LineInsert {
                batch_id: None,
                team_id,
                resource_id: resource.id,
                quantity: item.quantity,
                comment: "",
                needs_return: !resource.is_non_returnable,
            },
        )
        .await?;

        let purchases = fetch_purchases(&mut tx, &[id]).await?;
        tx.commit().await?;

        Ok(PurchaseReceipt {
            team,
            purchases,
            total_cost: cost,
        })
    }

    async fn create_batch(
        &self,
        team_id: TeamId,
        items: &[PurchaseItem],
        comment: &str,
    ) -> StorageResult<PurchaseReceipt> {
        rules::validate_batch_comment(comment)?;
        let items = rules::merge_batch_items(items)?;

        let mut tx = self.pool.begin().await?;

        let team = lock_team(&mut tx, team_id).await?;

        let mut resource_ids: Vec<ResourceId> = items.iter().map(|i| i.resource_id).collect();
        resource_ids.sort_unstable();
        let resources = lock_resources(&mut tx, &resource_ids).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let resource = resources
                .get(&item.resource_id)
                .ok_or(StorageError::ResourceNotFound)?;
            let held = confirmed_quantity(&mut tx, team_id, resource.id).await?;
            lines.push((resource, held, item.quantity));
        }

        let (priced, total_cost) = rules::price_batch(lines.iter().copied(), team.credit)?;

        let team = adjust_credit(&mut tx, team_id, -total_cost).await?;
        let batch_id = rules::batch_id(Utc::now(), team_id);
        let comment = comment.trim();

        let mut ids = Vec::with_capacity(priced.len());
        for line in &priced {
            let id = insert_line(
                &mut tx,
                LineInsert {
                    batch_id: Some(&batch_id),
                    team_id,
                    resource_id: line.resource_id,
                    quantity: line.quantity,
                    comment,
                    needs_return: line.needs_return,
                },
            )
            .await?;
            ids.push(id);
        }

        let purchases = fetch_purchases(&mut tx, &ids).await?;
        tx.commit().await?;

        Ok(PurchaseReceipt {
            team,
            purchases,
            total_cost,
        })
    }

    async fn decide(
        &self,
        id: PurchaseId,
        action: DecisionAction,
        approved_quantity: Option<i64>,
    ) -> StorageResult<Decision> {
        let mut tx = self.pool.begin().await?;

        let (team_id, resource_id) = purchase_keys(&mut tx, id).await?;
        lock_team(&mut tx, team_id).await?;
        let resource = lock_resource(&mut tx, resource_id).await?;
        let purchase = lock_purchase(&mut tx, id).await?;

        let (refund, adjusted) = match action {
            DecisionAction::Confirm => {
                let plan = rules::plan_approval(&purchase, resource.cost, resource.quantity, approved_quantity)?;

                if plan.refund > 0 {
                    adjust_credit(&mut tx, team_id, plan.refund).await?;
                }

                sqlx::query("UPDATE resources SET quantity = $1, updated_at = NOW() WHERE id = $2")
                    .bind(plan.stock_after)
                    .bind(resource_id)
                    .execute(&mut *tx)
                    .await?;

                sqlx::query(
                    "UPDATE purchases SET quantity = $1, status = $2, updated_at = NOW() WHERE id = $3",
                )
                .bind(plan.quantity)
                .bind(PurchaseStatus::Confirmed.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                (plan.refund, plan.adjusted)
            }
            DecisionAction::Cancel => {
                let refund = rules::plan_cancellation(&purchase, resource.cost)?;
                adjust_credit(&mut tx, team_id, refund).await?;

                sqlx::query("UPDATE purchases SET status = $1, updated_at = NOW() WHERE id = $2")
                    .bind(PurchaseStatus::Cancelled.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

                (refund, false)
            }
        };

        let purchase = lock_purchase(&mut tx, id).await?;
        tx.commit().await?;

        Ok(Decision {
            purchase,
            refund,
            adjusted,
        })
    }

    async fn return_purchase(&self, team_id: TeamId, id: PurchaseId) -> StorageResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let (_, resource_id) = purchase_keys(&mut tx, id).await?;
        let resource = lock_resource(&mut tx, resource_id).await?;
        let purchase = lock_purchase(&mut tx, id).await?;

        rules::check_team_return(&purchase, team_id, &resource)?;

        sqlx::query("UPDATE purchases SET is_returned = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE resources SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2")
            .bind(purchase.quantity)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

        let purchase = lock_purchase(&mut tx, id).await?;
        tx.commit().await?;

        Ok(purchase)
    }

    async fn mark_returned(&self, id: PurchaseId) -> StorageResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let purchase = lock_purchase(&mut tx, id).await?;
        rules::check_mark_returned(&purchase)?;

        sqlx::query("UPDATE purchases SET is_returned = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let purchase = lock_purchase(&mut tx, id).await?;
        tx.commit().await?;

        Ok(purchase)
    }

    async fn unmark_returned(&self, id: PurchaseId) -> StorageResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let purchase = lock_purchase(&mut tx, id).await?;
        rules::check_unmark_returned(&purchase)?;

        sqlx::query("UPDATE purchases SET is_returned = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let purchase = lock_purchase(&mut tx, id).await?;
        tx.commit().await?;

        Ok(purchase)
    }
}
