use async_trait::async_trait;
use sqlx::PgPool;
use ylab_core::{CompositionId, Department, SlotAction, TeamComposition};

use super::rows::{composition_from_row, COMPOSITION_COLUMNS};
use super::traits::{
    unique_violation, CompositionStore, NewComposition, StorageError, StorageResult,
};

/// PostgreSQL implementation of CompositionStore
pub struct PostgresCompositionStore {
    pool: PgPool,
}

impl PostgresCompositionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for team compositions
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS team_compositions (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                dev_total BIGINT NOT NULL DEFAULT 0,
                infra_total BIGINT NOT NULL DEFAULT 0,
                data_total BIGINT NOT NULL DEFAULT 0,
                iot_total BIGINT NOT NULL DEFAULT 0,
                sysemb_total BIGINT NOT NULL DEFAULT 0,
                dev_filled BIGINT NOT NULL DEFAULT 0 CHECK (dev_filled BETWEEN 0 AND dev_total),
                infra_filled BIGINT NOT NULL DEFAULT 0 CHECK (infra_filled BETWEEN 0 AND infra_total),
                data_filled BIGINT NOT NULL DEFAULT 0 CHECK (data_filled BETWEEN 0 AND data_total),
                iot_filled BIGINT NOT NULL DEFAULT 0 CHECK (iot_filled BETWEEN 0 AND iot_total),
                sysemb_filled BIGINT NOT NULL DEFAULT 0 CHECK (sysemb_filled BETWEEN 0 AND sysemb_total),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CompositionStore for PostgresCompositionStore {
    async fn list_compositions(&self) -> StorageResult<Vec<TeamComposition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_compositions ORDER BY name",
            COMPOSITION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(composition_from_row).collect()
    }

    async fn create_composition(&self, composition: NewComposition) -> StorageResult<TeamComposition> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO team_compositions
                (name, dev_total, infra_total, data_total, iot_total, sysemb_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COMPOSITION_COLUMNS
        ))
        .bind(composition.name.trim())
        .bind(composition.dev_total.max(0))
        .bind(composition.infra_total.max(0))
        .bind(composition.data_total.max(0))
        .bind(composition.iot_total.max(0))
        .bind(composition.sysemb_total.max(0))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Team composition already exists"))?;

        composition_from_row(&row)
    }

    async fn toggle_slot(
        &self,
        id: CompositionId,
        department: Department,
        action: SlotAction,
    ) -> StorageResult<TeamComposition> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM team_compositions WHERE id = $1 FOR UPDATE",
            COMPOSITION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::CompositionNotFound)?;

        let mut composition = composition_from_row(&row)?;
        let filled = composition.toggle(department, action);

        // Column name comes from a closed enum, never from input
        let row = sqlx::query(&format!(
            "UPDATE team_compositions SET {}_filled = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            department.as_str(),
            COMPOSITION_COLUMNS
        ))
        .bind(filled)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        composition_from_row(&row)
    }
}
