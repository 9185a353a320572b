use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthState, SessionManager};
use crate::config::ServerConfig;
use crate::notify::Notifier;
use crate::storage::{
    AccountStore, AuditStore, CatalogStore, CompositionStore, PollStore, PostgresAccountStore,
    PostgresAuditStore, PostgresCatalogStore, PostgresCompositionStore, PostgresPollStore,
    PostgresPurchaseStore, PurchaseStore,
};

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub accounts: Arc<dyn AccountStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub purchases: Arc<dyn PurchaseStore>,
    pub compositions: Arc<dyn CompositionStore>,
    pub polls: Arc<dyn PollStore>,
    pub audit_store: Arc<dyn AuditStore>,
    pub auth_state: Arc<AuthState>,
    pub notifier: Notifier,
    pub start_time: Instant,
}

impl ServerState {
    /// Build state backed by Postgres stores sharing one pool
    pub fn new(config: ServerConfig, db_pool: PgPool, notifier: Notifier) -> Self {
        let session_manager = SessionManager::new(config.session_timeout_seconds);
        let auth_state = Arc::new(AuthState::new(session_manager));

        Self {
            config,
            accounts: Arc::new(PostgresAccountStore::new(db_pool.clone())),
            catalog: Arc::new(PostgresCatalogStore::new(db_pool.clone())),
            purchases: Arc::new(PostgresPurchaseStore::new(db_pool.clone())),
            compositions: Arc::new(PostgresCompositionStore::new(db_pool.clone())),
            polls: Arc::new(PostgresPollStore::new(db_pool.clone())),
            audit_store: Arc::new(PostgresAuditStore::new(db_pool)),
            auth_state,
            notifier,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
