//! # Tidepool Core - Lazy Proportional Stake Accounting
//!
//! A stake pool where participants deposit a fungible asset, share in
//! periodic reward distributions, absorb periodic burns, and withdraw
//! principal plus net accrual. No operation ever iterates over stakers.
//!
//! ## Key Features
//!
//! - **Proportional shares**: distributions and burns only move the pool total, in O(1)
//! - **Compounding ratios**: reward and burn indices compound per event
//! - **Lazy settlement**: each position re-bases itself on its own next operation
//! - **Fixed-point math**: integer ratios scaled by 10^9, rounding in the pool's favour
//! - **Validate-then-commit**: a rejected call leaves ledger, position and custody unchanged
//!
//! ## Accounting Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          POOL LEDGER                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  total_value             Σ settled principal (+ rounding dust)         │
//! │  total_shares            Σ position shares                             │
//! │  cumulative_reward_ratio Π (T + reward) / T - 1         (× SCALE)      │
//! │  cumulative_burn_ratio   1 - Π (T - burn) / T           (× SCALE)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                 ▲ snapshot                       ▲ snapshot
//!        ┌────────┴────────┐              ┌────────┴────────┐
//!        │  POSITION (A)   │     ...      │  POSITION (Z)   │
//!        │  shares         │              │  shares         │
//!        │  principal      │              │  principal      │
//!        │  reward/burn    │              │  reward/burn    │
//!        │  snapshots      │              │  snapshots      │
//!        └─────────────────┘              └─────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation | Caller | Effect |
//! |-----------|--------|--------|
//! | `initialize_pool` | program authority | creates the ledger |
//! | `create_position` | anyone | empty position bound to the caller |
//! | `stake` | position owner | settle, mint shares, credit principal and ledger |
//! | `unstake` / `unstake_amount` | position owner | settle, retire shares, pay out, debit ledger |
//! | `distribute` | pool authority | compound reward index, credit total |
//! | `burn` | pool authority | compound burn index, debit total |
//! | `donate` / `withdraw_donations` | pool authority | vault value outside staker total |

pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod math;
pub mod pool;
pub mod position;
pub mod settlement;
pub mod types;

// Re-exports
pub use config::{LogFormat, LoggingConfig, PoolConfig};
pub use custody::{Custody, MemoryCustody};
pub use error::{PoolError, Result};
pub use events::PoolEvent;
pub use ledger::PoolLedger;
pub use math::SCALE;
pub use pool::{PoolAudit, PoolRegistry, StakePool};
pub use position::StakePosition;
pub use settlement::{settle, Settlement};
pub use types::{incinerator_address, vault_address, AssetId, Identity, PositionId};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::custody::{Custody, MemoryCustody};
    pub use crate::error::{PoolError, Result};
    pub use crate::pool::{PoolRegistry, StakePool};
    pub use crate::types::{AssetId, Identity, PositionId};
}
