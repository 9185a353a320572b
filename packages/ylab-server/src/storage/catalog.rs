use async_trait::async_trait;
use sqlx::PgPool;
use ylab_core::{Resource, ResourceId, ResourceKind};

use super::rows::{resource_from_row, RESOURCE_COLUMNS};
use super::traits::{unique_violation, CatalogStore, NewResource, StorageError, StorageResult};

/// PostgreSQL implementation of CatalogStore
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for resources
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                cost BIGINT NOT NULL CHECK (cost >= 0),
                quantity BIGINT NOT NULL CHECK (quantity >= 0),
                max_per_team BIGINT NOT NULL CHECK (max_per_team >= 0),
                type VARCHAR(20) NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_non_returnable BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_type ON resources(type)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn list_resources(
        &self,
        kind: Option<ResourceKind>,
        include_inactive: bool,
    ) -> StorageResult<Vec<Resource>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM resources
            WHERE ($1::TEXT IS NULL OR type = $1)
              AND ($2 OR is_active)
            ORDER BY id
            "#,
            RESOURCE_COLUMNS
        ))
        .bind(kind.map(|k| k.as_str()))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| resource_from_row(row, "")).collect()
    }

    async fn get_resource(&self, id: ResourceId) -> StorageResult<Resource> {
        let row = sqlx::query(&format!("SELECT {} FROM resources WHERE id = $1", RESOURCE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::ResourceNotFound)?;

        resource_from_row(&row, "")
    }

    async fn create_resource(&self, resource: NewResource) -> StorageResult<Resource> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO resources
                (name, description, cost, quantity, max_per_team, type, image_url, is_non_returnable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        ))
        .bind(resource.name.trim())
        .bind(&resource.description)
        .bind(resource.cost)
        .bind(resource.quantity)
        .bind(resource.max_per_team)
        .bind(resource.kind.as_str())
        .bind(&resource.image_url)
        .bind(resource.is_non_returnable)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Resource name already exists"))?;

        resource_from_row(&row, "")
    }

    async fn set_stock(&self, id: ResourceId, quantity: i64) -> StorageResult<Resource> {
        let row = sqlx::query(&format!(
            "UPDATE resources SET quantity = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(quantity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::ResourceNotFound)?;

        resource_from_row(&row, "")
    }

    async fn set_active(&self, id: ResourceId, active: bool) -> StorageResult<Resource> {
        let row = sqlx::query(&format!(
            "UPDATE resources SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::ResourceNotFound)?;

        resource_from_row(&row, "")
    }
}
