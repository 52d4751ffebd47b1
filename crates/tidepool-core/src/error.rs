//! Error types for Tidepool pool operations

use crate::types::{AssetId, PositionId};
use thiserror::Error;

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur while operating a stake pool.
///
/// Every error is raised before any ledger, position or custody state is
/// mutated, so a failed operation leaves the pool exactly as it found it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // === Input validation ===
    /// Amount was zero
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === Authorization ===
    /// Caller is not the pool (or program) authority
    #[error("Caller is not the pool authority")]
    Unauthorized,

    /// Caller does not own the position
    #[error("Caller does not own this position")]
    InvalidOwner,

    // === Ledger ===
    /// Ratio operation against a pool with zero total value
    #[error("Pool has no staked value")]
    EmptyPool,

    /// Withdrawal or burn exceeds the ledger total
    #[error("Insufficient ledger value: requested {requested}, available {available}")]
    InsufficientLedgerValue { requested: u64, available: u64 },

    /// Source of a transfer (or a position) lacks the requested balance
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    /// Donation withdrawal exceeds recorded donations
    #[error("Insufficient donations: requested {requested}, available {available}")]
    InsufficientDonations { requested: u64, available: u64 },

    /// Integer overflow in accumulation
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // === Lifecycle ===
    /// Pool for this asset already exists
    #[error("Pool already initialized for asset {0}")]
    AlreadyInitialized(AssetId),

    /// No pool for this asset
    #[error("Pool not found for asset {0}")]
    PoolNotFound(AssetId),

    /// Position already created for this owner
    #[error("Position already exists: {0}")]
    PositionExists(PositionId),

    /// Position does not exist
    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    /// Position has nothing to pay out
    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    // === General ===
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidAmount => 6000,
            Self::Unauthorized => 6001,
            Self::InvalidOwner => 6002,
            Self::EmptyPool => 6003,
            Self::InsufficientLedgerValue { .. } => 6004,
            Self::InsufficientFunds { .. } => 6005,
            Self::InsufficientDonations { .. } => 6006,
            Self::ArithmeticOverflow => 6007,
            Self::AlreadyInitialized(_) => 6008,
            Self::PoolNotFound(_) => 6009,
            Self::PositionExists(_) => 6010,
            Self::PositionNotFound(_) => 6011,
            Self::NothingToWithdraw => 6012,
            Self::Config(_) => 9999,
        }
    }

    /// Snake-case name of the error kind, independent of its payload
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::Unauthorized => "unauthorized",
            Self::InvalidOwner => "invalid_owner",
            Self::EmptyPool => "empty_pool",
            Self::InsufficientLedgerValue { .. } => "insufficient_ledger_value",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientDonations { .. } => "insufficient_donations",
            Self::ArithmeticOverflow => "arithmetic_overflow",
            Self::AlreadyInitialized(_) => "already_initialized",
            Self::PoolNotFound(_) => "pool_not_found",
            Self::PositionExists(_) => "position_exists",
            Self::PositionNotFound(_) => "position_not_found",
            Self::NothingToWithdraw => "nothing_to_withdraw",
            Self::Config(_) => "config",
        }
    }

    /// Check if the same call may succeed once external balances change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }
}
