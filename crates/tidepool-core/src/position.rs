//! Per-participant stake record

use serde::{Deserialize, Serialize};

use crate::ledger::PoolLedger;
use crate::types::{AssetId, Identity, PositionId};

/// A participant's stake in one pool.
///
/// `shares` is the position's claim on the ledger's `total_value`.
/// `principal` is what those shares were worth at the last settlement and
/// the snapshots are the ledger ratios at that moment. Shares minted in an
/// earlier `epoch` are worth nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Position identifier (derived from owner and asset)
    pub id: PositionId,

    /// Sole identity allowed to stake into or withdraw from this position
    pub owner: Identity,

    /// Pool asset
    pub asset: AssetId,

    /// Settled value
    pub principal: u64,

    /// Claim on the ledger's total value
    pub shares: u128,

    /// Ledger epoch the shares belong to
    pub epoch: u64,

    /// Ledger reward ratio at last settlement
    pub snapshot_reward_ratio: u128,

    /// Ledger burn ratio at last settlement
    pub snapshot_burn_ratio: u128,

    /// Creation time (unix seconds)
    pub created_at: i64,

    /// Last deposit time
    pub last_staked_at: Option<i64>,

    /// Last withdrawal time
    pub last_unstaked_at: Option<i64>,
}

impl StakePosition {
    /// Create an empty position snapshotted at the ledger's current ratios
    pub fn new(owner: Identity, ledger: &PoolLedger, created_at: i64) -> Self {
        Self {
            id: PositionId::derive(&owner, &ledger.asset),
            owner,
            asset: ledger.asset,
            principal: 0,
            shares: 0,
            epoch: ledger.epoch,
            snapshot_reward_ratio: ledger.cumulative_reward_ratio,
            snapshot_burn_ratio: ledger.cumulative_burn_ratio,
            created_at,
            last_staked_at: None,
            last_unstaked_at: None,
        }
    }

    /// Check if `caller` owns this position
    pub fn is_owned_by(&self, caller: &Identity) -> bool {
        self.owner == *caller
    }

    /// Check if the position holds no value
    pub fn is_empty(&self) -> bool {
        self.principal == 0
    }

    /// Check if the snapshots match the ledger's current ratios and epoch
    pub fn is_current(&self, ledger: &PoolLedger) -> bool {
        self.snapshot_reward_ratio == ledger.cumulative_reward_ratio
            && self.snapshot_burn_ratio == ledger.cumulative_burn_ratio
            && self.epoch == ledger.epoch
    }

    /// Shares still backed by the ledger
    pub fn live_shares(&self, ledger: &PoolLedger) -> u128 {
        if self.epoch == ledger.epoch {
            self.shares
        } else {
            0
        }
    }
}
