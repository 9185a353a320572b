use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ylab_core::api::{DecisionAction, PurchaseItem, VoteRequest};
use ylab_core::{
    AdminId, AdminProfile, CompositionId, Department, MarketError, Poll, PollId, PollStatus,
    Purchase, PurchaseId, PurchaseStatus, Resource, ResourceId, ResourceKind, SlotAction,
    TeamComposition, TeamId, TeamProfile, Vote,
};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A marketplace rule rejected the operation
    #[error(transparent)]
    Rule(#[from] MarketError),

    #[error("Team not found")]
    TeamNotFound,

    #[error("Admin not found")]
    AdminNotFound,

    #[error("Resource not found")]
    ResourceNotFound,

    #[error("Purchase not found")]
    PurchaseNotFound,

    #[error("Team composition not found")]
    CompositionNotFound,

    #[error("Poll not found")]
    PollNotFound,

    #[error("Vote not found")]
    VoteNotFound,

    /// Unique constraint violated; the message is client-facing
    #[error("{0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored enum column held a value we do not know
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TeamNotFound
                | Self::AdminNotFound
                | Self::ResourceNotFound
                | Self::PurchaseNotFound
                | Self::CompositionNotFound
                | Self::PollNotFound
                | Self::VoteNotFound
        )
    }
}

/// Map a unique violation to `Duplicate`, everything else to `Database`
pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> StorageError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StorageError::Duplicate(message.to_string());
        }
    }
    StorageError::Database(err)
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub credit: i64,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub description: String,
    pub cost: i64,
    pub quantity: i64,
    pub max_per_team: i64,
    pub kind: ResourceKind,
    pub image_url: String,
    pub is_non_returnable: bool,
}

/// Slot totals per department for a new composition
#[derive(Debug, Clone, Default)]
pub struct NewComposition {
    pub name: String,
    pub dev_total: i64,
    pub infra_total: i64,
    pub data_total: i64,
    pub iot_total: i64,
    pub sysemb_total: i64,
}

#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Admin purchase listing filters
#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    pub status: Option<PurchaseStatus>,
    pub team_id: Option<TeamId>,
    /// Only confirmed, not yet returned purchases that must come back
    pub needs_return: bool,
}

/// Purchases written by one order, with the team as it stands afterwards
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub team: TeamProfile,
    pub purchases: Vec<Purchase>,
    pub total_cost: i64,
}

/// A committed admin decision. `purchase` embeds its team and resource.
#[derive(Debug, Clone)]
pub struct Decision {
    pub purchase: Purchase,
    pub refund: i64,
    /// Confirmed with a quantity other than the one requested
    pub adjusted: bool,
}

/// Team and admin accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_team(&self, team: NewTeam) -> StorageResult<TeamProfile>;

    async fn get_team(&self, id: TeamId) -> StorageResult<TeamProfile>;

    /// Look a team up by name, then by normalized email. Returns the profile and password hash.
    async fn find_team_credentials(&self, login: &str) -> StorageResult<Option<(TeamProfile, String)>>;

    async fn list_teams(&self) -> StorageResult<Vec<TeamProfile>>;

    async fn touch_team(&self, id: TeamId) -> StorageResult<()>;

    async fn update_team_email(&self, id: TeamId, email: &str) -> StorageResult<TeamProfile>;

    async fn set_team_credit(&self, id: TeamId, credit: i64) -> StorageResult<TeamProfile>;

    async fn set_team_password(&self, id: TeamId, password_hash: &str) -> StorageResult<()>;

    async fn create_admin(&self, admin: NewAdmin) -> StorageResult<AdminProfile>;

    async fn get_admin(&self, id: AdminId) -> StorageResult<AdminProfile>;

    async fn find_admin_credentials(&self, username: &str) -> StorageResult<Option<(AdminProfile, String)>>;

    async fn list_admins(&self) -> StorageResult<Vec<AdminProfile>>;

    async fn set_admin_password(&self, id: AdminId, password_hash: &str) -> StorageResult<()>;
}

/// Resource catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resources ordered by id. Inactive ones are skipped unless asked for.
    async fn list_resources(
        &self,
        kind: Option<ResourceKind>,
        include_inactive: bool,
    ) -> StorageResult<Vec<Resource>>;

    async fn get_resource(&self, id: ResourceId) -> StorageResult<Resource>;

    async fn create_resource(&self, resource: NewResource) -> StorageResult<Resource>;

    async fn set_stock(&self, id: ResourceId, quantity: i64) -> StorageResult<Resource>;

    async fn set_active(&self, id: ResourceId, active: bool) -> StorageResult<Resource>;
}

/// Purchase ledger. Every mutation runs in a single transaction.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// A team's purchases, newest first, with resources embedded
    async fn list_team_purchases(&self, team_id: TeamId, needs_return: bool) -> StorageResult<Vec<Purchase>>;

    /// All purchases matching the filter, newest first, with team and resource embedded
    async fn list_purchases(&self, filter: PurchaseFilter) -> StorageResult<Vec<Purchase>>;

    async fn get_purchase(&self, id: PurchaseId) -> StorageResult<Purchase>;

    async fn create_purchase(&self, team_id: TeamId, item: PurchaseItem) -> StorageResult<PurchaseReceipt>;

    /// Validate and price every line before writing any of them
    async fn create_batch(
        &self,
        team_id: TeamId,
        items: &[PurchaseItem],
        comment: &str,
    ) -> StorageResult<PurchaseReceipt>;

    async fn decide(
        &self,
        id: PurchaseId,
        action: DecisionAction,
        approved_quantity: Option<i64>,
    ) -> StorageResult<Decision>;

    /// Team hands a confirmed item back; stock is restored, credit is not
    async fn return_purchase(&self, team_id: TeamId, id: PurchaseId) -> StorageResult<Purchase>;

    async fn mark_returned(&self, id: PurchaseId) -> StorageResult<Purchase>;

    async fn unmark_returned(&self, id: PurchaseId) -> StorageResult<Purchase>;
}

/// Team composition boards
#[async_trait]
pub trait CompositionStore: Send + Sync {
    async fn list_compositions(&self) -> StorageResult<Vec<TeamComposition>>;

    async fn create_composition(&self, composition: NewComposition) -> StorageResult<TeamComposition>;

    async fn toggle_slot(
        &self,
        id: CompositionId,
        department: Department,
        action: SlotAction,
    ) -> StorageResult<TeamComposition>;
}

/// Polls and credit-staked votes
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Polls ordered by start date, newest first
    async fn list_polls(&self, status: Option<PollStatus>) -> StorageResult<Vec<Poll>>;

    /// A poll with its votes loaded
    async fn get_poll(&self, id: PollId) -> StorageResult<Poll>;

    async fn create_poll(&self, poll: NewPoll) -> StorageResult<Poll>;

    async fn close_poll(&self, id: PollId) -> StorageResult<Poll>;

    async fn list_team_votes(&self, team_id: TeamId) -> StorageResult<Vec<Vote>>;

    async fn get_team_vote(&self, team_id: TeamId, poll_id: PollId) -> StorageResult<Vote>;

    /// Record a vote and deduct the stake from the team's credit
    async fn cast_vote(&self, team_id: TeamId, vote: VoteRequest) -> StorageResult<Vote>;
}
