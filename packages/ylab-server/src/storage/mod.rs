mod accounts;
mod audit;
mod catalog;
mod compositions;
mod polls;
mod purchases;
mod rows;
mod traits;

pub use accounts::PostgresAccountStore;
pub use audit::{AuditAction, AuditEntry, AuditEntryBuilder, AuditStore, PostgresAuditStore};
pub use catalog::PostgresCatalogStore;
pub use compositions::PostgresCompositionStore;
pub use polls::PostgresPollStore;
pub use purchases::PostgresPurchaseStore;
pub use traits::{
    AccountStore, CatalogStore, CompositionStore, Decision, NewAdmin, NewComposition, NewPoll,
    NewResource, NewTeam, PollStore, PurchaseFilter, PurchaseReceipt, PurchaseStore, StorageError,
    StorageResult,
};

/// Create every table, parents before the tables referencing them
pub async fn initialize_schema(pool: &sqlx::PgPool) -> StorageResult<()> {
    PostgresAccountStore::new(pool.clone()).initialize().await?;
    PostgresCatalogStore::new(pool.clone()).initialize().await?;
    PostgresPurchaseStore::new(pool.clone()).initialize().await?;
    PostgresCompositionStore::new(pool.clone()).initialize().await?;
    PostgresPollStore::new(pool.clone()).initialize().await?;
    PostgresAuditStore::new(pool.clone()).initialize().await?;
    Ok(())
}
