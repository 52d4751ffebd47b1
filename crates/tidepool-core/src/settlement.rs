//! # Settlement
//!
//! Re-bases a position against everything the ledger accrued since the
//! position's snapshot, without visiting any other position.
//!
//! ```text
//! settled = ledger.value_of(position.shares)
//! grown   = max(principal * reward_index_now / reward_index_then, settled)
//! reward  = grown - principal
//! burned  = grown - settled
//! ```
//!
//! The settled value comes from the position's shares, so the settled
//! values of all positions never add up to more than the ledger total.
//! The reward index splits the change into what was earned and what was
//! burned on top of it. Settling twice with no ledger change in between is
//! a no-op.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::{reward_index, PoolLedger};
use crate::math::{mul_div, ratio_delta, to_amount};
use crate::position::StakePosition;

/// Breakdown of one settlement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Principal before settlement
    pub principal_before: u64,

    /// Reward credited
    pub reward: u64,

    /// Burn debited (from the reward-grown amount), rounding included
    pub burned: u64,

    /// Principal after settlement
    pub principal_after: u64,

    /// Reward ratio accrued since the snapshot
    pub reward_delta: u128,

    /// Burn ratio accrued since the snapshot
    pub burn_delta: u128,
}

impl Settlement {
    /// Check if settlement changed the principal
    pub fn is_noop(&self) -> bool {
        self.principal_before == self.principal_after
    }
}

/// Compute the settled form of `position` against `ledger`.
///
/// Pure: returns the re-based position and the breakdown, leaving the
/// input untouched.
pub fn settle(position: &StakePosition, ledger: &PoolLedger) -> Result<(StakePosition, Settlement)> {
    let reward_delta = ratio_delta(ledger.cumulative_reward_ratio, position.snapshot_reward_ratio)?;
    let burn_delta = ratio_delta(ledger.cumulative_burn_ratio, position.snapshot_burn_ratio)?;

    let shares = position.live_shares(ledger);
    let principal = position.principal;
    let principal_after = ledger.value_of(shares)?;

    let grown = to_amount(mul_div(
        principal as u128,
        ledger.reward_index()?,
        reward_index(position.snapshot_reward_ratio)?,
    )?)?
    .max(principal_after);

    if principal > 0 && principal_after == 0 {
        tracing::warn!(
            position = %position.id,
            grown,
            burn_delta = %burn_delta,
            "Burn exhausted position during settlement"
        );
    }

    let settlement = Settlement {
        principal_before: principal,
        reward: grown - principal,
        burned: grown - principal_after,
        principal_after,
        reward_delta,
        burn_delta,
    };

    let mut settled = position.clone();
    settled.principal = principal_after;
    settled.shares = shares;
    settled.epoch = ledger.epoch;
    settled.snapshot_reward_ratio = ledger.cumulative_reward_ratio;
    settled.snapshot_burn_ratio = ledger.cumulative_burn_ratio;

    if !settlement.is_noop() {
        tracing::debug!(
            position = %position.id,
            before = settlement.principal_before,
            reward = settlement.reward,
            burned = settlement.burned,
            after = settlement.principal_after,
            "Settled position"
        );
    }

    Ok((settled, settlement))
}
