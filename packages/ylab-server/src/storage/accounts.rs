use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use ylab_core::rules::normalize_email;
use ylab_core::{AdminId, AdminProfile, TeamId, TeamProfile};

use super::rows::{admin_from_row, team_from_row, ADMIN_COLUMNS, TEAM_COLUMNS};
use super::traits::{unique_violation, AccountStore, NewAdmin, NewTeam, StorageError, StorageResult};

/// PostgreSQL implementation of AccountStore
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for teams and admins
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                credit BIGINT NOT NULL DEFAULT 1000 CHECK (credit >= 0),
                last_activity TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(255) UNIQUE NOT NULL,
                email VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
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
impl AccountStore for PostgresAccountStore {
    async fn create_team(&self, team: NewTeam) -> StorageResult<TeamProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO teams (name, email, password_hash, credit)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TEAM_COLUMNS
        ))
        .bind(team.name.trim())
        .bind(normalize_email(&team.email))
        .bind(&team.password_hash)
        .bind(team.credit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Team name or email already exists"))?;

        team_from_row(&row, "")
    }

    async fn get_team(&self, id: TeamId) -> StorageResult<TeamProfile> {
        let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = $1", TEAM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::TeamNotFound)?;

        team_from_row(&row, "")
    }

    async fn find_team_credentials(&self, login: &str) -> StorageResult<Option<(TeamProfile, String)>> {
        let query = format!(
            "SELECT {}, password_hash FROM teams WHERE name = $1 OR email = $2 \
             ORDER BY (name = $1) DESC LIMIT 1",
            TEAM_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(login.trim())
            .bind(normalize_email(login))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let hash: String = row.try_get("password_hash")?;
                Ok(Some((team_from_row(&row, "")?, hash)))
            }
            None => Ok(None),
        }
    }

    async fn list_teams(&self) -> StorageResult<Vec<TeamProfile>> {
        let rows = sqlx::query(&format!("SELECT {} FROM teams ORDER BY name", TEAM_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| team_from_row(row, "")).collect()
    }

    async fn touch_team(&self, id: TeamId) -> StorageResult<()> {
        sqlx::query("UPDATE teams SET last_activity = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_team_email(&self, id: TeamId, email: &str) -> StorageResult<TeamProfile> {
        let row = sqlx::query(&format!(
            "UPDATE teams SET email = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(normalize_email(email))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Email already taken"))?
        .ok_or(StorageError::TeamNotFound)?;

        team_from_row(&row, "")
    }

    async fn set_team_credit(&self, id: TeamId, credit: i64) -> StorageResult<TeamProfile> {
        let row = sqlx::query(&format!(
            "UPDATE teams SET credit = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(credit)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::TeamNotFound)?;

        team_from_row(&row, "")
    }

    async fn set_team_password(&self, id: TeamId, password_hash: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE teams SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::TeamNotFound);
        }
        Ok(())
    }

    async fn create_admin(&self, admin: NewAdmin) -> StorageResult<AdminProfile> {
        let row = sqlx::query(&format!(
            "INSERT INTO admins (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            ADMIN_COLUMNS
        ))
        .bind(admin.username.trim())
        .bind(normalize_email(&admin.email))
        .bind(&admin.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Admin username already exists"))?;

        admin_from_row(&row)
    }

    async fn get_admin(&self, id: AdminId) -> StorageResult<AdminProfile> {
        let row = sqlx::query(&format!("SELECT {} FROM admins WHERE id = $1", ADMIN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::AdminNotFound)?;

        admin_from_row(&row)
    }

    async fn find_admin_credentials(&self, username: &str) -> StorageResult<Option<(AdminProfile, String)>> {
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM admins WHERE username = $1",
            ADMIN_COLUMNS
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let hash: String = row.try_get("password_hash")?;
                Ok(Some((admin_from_row(&row)?, hash)))
            }
            None => Ok(None),
        }
    }

    async fn list_admins(&self) -> StorageResult<Vec<AdminProfile>> {
        let rows = sqlx::query(&format!("SELECT {} FROM admins ORDER BY username", ADMIN_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(admin_from_row).collect()
    }

    async fn set_admin_password(&self, id: AdminId, password_hash: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE admins SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AdminNotFound);
        }
        Ok(())
    }
}
