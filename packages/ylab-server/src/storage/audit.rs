use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::traits::{StorageError, StorageResult};

/// Actions that can be audited
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Authentication
    LoginSuccess,
    LoginFailed,
    Logout,

    // Team activity
    ProfileUpdated,
    PurchaseCreated,
    BatchPurchaseCreated,
    PurchaseReturned,
    VoteCast,

    // Admin decisions
    PurchaseDecided,
    BatchDecided,
    ReturnMarked,
    ReturnUnmarked,
    SlotToggled,

    // Anything else that mutates
    ApiRequest,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailed => "login_failed",
            Self::Logout => "logout",
            Self::ProfileUpdated => "profile_updated",
            Self::PurchaseCreated => "purchase_created",
            Self::BatchPurchaseCreated => "batch_purchase_created",
            Self::PurchaseReturned => "purchase_returned",
            Self::VoteCast => "vote_cast",
            Self::PurchaseDecided => "purchase_decided",
            Self::BatchDecided => "batch_decided",
            Self::ReturnMarked => "return_marked",
            Self::ReturnUnmarked => "return_unmarked",
            Self::SlotToggled => "slot_toggled",
            Self::ApiRequest => "api_request",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "login_success" => Some(Self::LoginSuccess),
            "login_failed" => Some(Self::LoginFailed),
            "logout" => Some(Self::Logout),
            "profile_updated" => Some(Self::ProfileUpdated),
            "purchase_created" => Some(Self::PurchaseCreated),
            "batch_purchase_created" => Some(Self::BatchPurchaseCreated),
            "purchase_returned" => Some(Self::PurchaseReturned),
            "vote_cast" => Some(Self::VoteCast),
            "purchase_decided" => Some(Self::PurchaseDecided),
            "batch_decided" => Some(Self::BatchDecided),
            "return_marked" => Some(Self::ReturnMarked),
            "return_unmarked" => Some(Self::ReturnUnmarked),
            "slot_toggled" => Some(Self::SlotToggled),
            "api_request" => Some(Self::ApiRequest),
            _ => None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `team:3` or `admin:1`; unset for logins
    pub principal: Option<String>,
    pub action: AuditAction,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub http_status: Option<i32>,
    pub details: Option<serde_json::Value>,
    pub success: bool,
}

/// Builder for creating audit entries
#[derive(Debug, Default)]
pub struct AuditEntryBuilder {
    principal: Option<String>,
    action: Option<AuditAction>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    http_method: Option<String>,
    http_path: Option<String>,
    http_status: Option<i32>,
    details: Option<serde_json::Value>,
    success: bool,
}

impl AuditEntryBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action: Some(action),
            success: true,
            ..Default::default()
        }
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn ip_address(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn http_request(mut self, method: &str, path: &str) -> Self {
        self.http_method = Some(method.to_string());
        self.http_path = Some(path.to_string());
        self
    }

    pub fn http_status(mut self, status: i32) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            principal: self.principal,
            action: self.action.unwrap_or(AuditAction::ApiRequest),
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            http_method: self.http_method,
            http_path: self.http_path,
            http_status: self.http_status,
            details: self.details,
            success: self.success,
        }
    }
}

/// Audit store trait
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Log an audit entry
    async fn log(&self, entry: AuditEntry) -> StorageResult<()>;

    /// Most recent entries first
    async fn recent(&self, limit: i64) -> StorageResult<Vec<AuditEntry>>;

    /// Entries recorded for one principal, most recent first
    async fn for_principal(&self, principal: &str, limit: i64) -> StorageResult<Vec<AuditEntry>>;
}

/// PostgreSQL implementation of AuditStore
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for audit logs
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id UUID PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                principal VARCHAR(255),
                action VARCHAR(50) NOT NULL,
                resource_type VARCHAR(50),
                resource_id VARCHAR(255),
                ip_address VARCHAR(45),
                user_agent TEXT,
                http_method VARCHAR(10),
                http_path TEXT,
                http_status INTEGER,
                details JSONB,
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes for common queries
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_logs(timestamp DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_principal ON audit_logs(principal) WHERE principal IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn entry_from_row(row: &PgRow) -> StorageResult<AuditEntry> {
    let action: String = row.try_get("action")?;

    Ok(AuditEntry {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        principal: row.try_get("principal")?,
        action: AuditAction::from_str(&action)
            .ok_or_else(|| StorageError::Corrupt(format!("audit action '{}'", action)))?,
        resource_type: row.try_get("resource_type")?,
        resource_id: row.try_get("resource_id")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        http_method: row.try_get("http_method")?,
        http_path: row.try_get("http_path")?,
        http_status: row.try_get("http_status")?,
        details: row.try_get("details")?,
        success: row.try_get("success")?,
    })
}

const AUDIT_COLUMNS: &str = "id, timestamp, principal, action, resource_type, resource_id, \
     ip_address, user_agent, http_method, http_path, http_status, details, success";

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn log(&self, entry: AuditEntry) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, timestamp, principal, action, resource_type, resource_id,
                ip_address, user_agent, http_method, http_path, http_status, details, success
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(&entry.principal)
        .bind(entry.action.as_str())
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.http_method)
        .bind(&entry.http_path)
        .bind(entry.http_status)
        .bind(&entry.details)
        .bind(entry.success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<AuditEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM audit_logs ORDER BY timestamp DESC LIMIT $1",
            AUDIT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn for_principal(&self, principal: &str, limit: i64) -> StorageResult<Vec<AuditEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM audit_logs WHERE principal = $1 ORDER BY timestamp DESC LIMIT $2",
            AUDIT_COLUMNS
        ))
        .bind(principal)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            AuditAction::LoginFailed,
            AuditAction::BatchPurchaseCreated,
            AuditAction::PurchaseDecided,
            AuditAction::SlotToggled,
        ] {
            assert_eq!(AuditAction::from_str(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::from_str("job_submitted"), None);
    }

    #[test]
    fn test_builder_defaults() {
        let entry = AuditEntryBuilder::new(AuditAction::PurchaseReturned)
            .principal("team:7")
            .resource("purchase", "42")
            .http_status(200)
            .build();

        assert!(entry.success);
        assert_eq!(entry.principal.as_deref(), Some("team:7"));
        assert_eq!(entry.resource_id.as_deref(), Some("42"));
        assert!(entry.details.is_none());
    }
}
