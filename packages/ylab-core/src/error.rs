use thiserror::Error;

/// Business rule violations. Display strings are the messages returned to
/// clients, so they follow the wording teams already see in the UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Resource is not available")]
    ResourceUnavailable,

    #[error("Insufficient quantity available")]
    InsufficientQuantity,

    #[error("Ressource {0} : dépassement de la quantité maximale par équipe")]
    QuotaExceeded(String),

    #[error("Insufficient credit")]
    InsufficientCredit,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Batch must contain at least one item")]
    EmptyBatch,

    #[error("Comment must be at least {0} characters")]
    CommentTooShort(usize),

    #[error("Comment is too long")]
    CommentTooLong,

    #[error("Purchase already processed")]
    AlreadyProcessed,

    #[error("Invalid approved quantity")]
    InvalidApprovedQuantity,

    #[error("Insufficient stock")]
    InsufficientStock,

    #[error("Not authorized")]
    NotOwner,

    #[error("Purchase already returned")]
    AlreadyReturned,

    #[error("Can only return confirmed purchases")]
    ReturnRequiresConfirmed,

    #[error("This resource is non-returnable")]
    NonReturnable,

    #[error("Only confirmed purchases can be marked as returned")]
    MarkRequiresConfirmed,

    #[error("Purchase already marked as returned")]
    AlreadyMarkedReturned,

    #[error("Purchase is not marked as returned")]
    NotMarkedReturned,

    #[error("Poll is closed")]
    PollClosed,

    #[error("Poll is not currently active")]
    PollInactive,

    #[error("Invalid option")]
    InvalidOption,

    #[error("Team has already voted on this poll")]
    AlreadyVoted,

    #[error("Credit stake must be at least 1")]
    InvalidStake,

    #[error("Invalid email format")]
    InvalidEmail,
}

impl MarketError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
            Self::InsufficientQuantity | Self::InsufficientStock => "INSUFFICIENT_STOCK",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::InsufficientCredit => "INSUFFICIENT_CREDIT",
            Self::InvalidQuantity | Self::InvalidApprovedQuantity => "INVALID_QUANTITY",
            Self::EmptyBatch | Self::CommentTooShort(_) | Self::CommentTooLong => "INVALID_INPUT",
            Self::AlreadyProcessed => "ALREADY_PROCESSED",
            Self::NotOwner => "FORBIDDEN",
            Self::AlreadyReturned
            | Self::ReturnRequiresConfirmed
            | Self::NonReturnable
            | Self::MarkRequiresConfirmed
            | Self::AlreadyMarkedReturned
            | Self::NotMarkedReturned => "INVALID_RETURN",
            Self::PollClosed | Self::PollInactive | Self::InvalidOption => "INVALID_VOTE",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::InvalidStake => "INVALID_STAKE",
            Self::InvalidEmail => "INVALID_EMAIL",
        }
    }

    /// Violations caused by acting on someone else's data
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::NotOwner)
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
