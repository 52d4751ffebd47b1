//! # Pool Ledger
//!
//! The single shared record per staked asset.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `total_value` | Aggregate value attributable to all positions |
//! | `total_shares` | Claims on `total_value` held across all positions |
//! | `cumulative_reward_ratio` | Reward index minus `SCALE`; compounds per distribution |
//! | `cumulative_burn_ratio` | `SCALE` minus the survival index; compounds per burn |
//! | `epoch` | Bumped when a burn takes `total_value` to zero |
//! | `donations` | Authority donations held in the vault, outside `total_value` |
//!
//! A position owning `shares` is worth `floor(shares * total_value / total_shares)`.
//! Distributions and burns only move `total_value`, so every position
//! gains or loses in proportion without being visited. The exact values
//! always sum to `total_value`, and flooring each one leaves less than one
//! unit per position behind in the pool.
//!
//! The ratios compound:
//!
//! ```text
//! distribute(R): reward_index   *= (T + R) / T
//! burn(B):       survival_index *= (T - B) / T
//! ```
//!
//! so `principal * index_now / index_then` is what a position held since
//! `then` has grown or shrunk to. Both deltas equal `scaled_ratio(amount, T)`
//! while the index is still at `SCALE`.
//!
//! Every mutator validates first and assigns last, so an `Err` return
//! leaves the ledger unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::math::{add_amount, add_ratio, mul_div, mul_div_up, to_amount, SCALE};
use crate::types::{AssetId, Identity};

/// Pool-wide aggregate record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLedger {
    /// Staked asset
    pub asset: AssetId,

    /// Identity allowed to distribute, burn and manage donations
    pub authority: Identity,

    /// Current aggregate value of all positions
    pub total_value: u64,

    /// Outstanding shares; zero exactly when `total_value` is zero
    pub total_shares: u128,

    /// Cumulative reward ratio, scaled by `SCALE`
    pub cumulative_reward_ratio: u128,

    /// Cumulative burn ratio, scaled by `SCALE`
    pub cumulative_burn_ratio: u128,

    /// Generation of `total_shares`; shares from an older epoch are worthless
    pub epoch: u64,

    /// Donated value held in the vault but not owed to stakers
    pub donations: u64,

    /// Creation time (unix seconds)
    pub initialized_at: i64,
}

impl PoolLedger {
    /// Create an empty ledger owned by `authority`
    pub fn new(asset: AssetId, authority: Identity, initialized_at: i64) -> Self {
        Self {
            asset,
            authority,
            total_value: 0,
            total_shares: 0,
            cumulative_reward_ratio: 0,
            cumulative_burn_ratio: 0,
            epoch: 0,
            donations: 0,
            initialized_at,
        }
    }

    /// Check if `caller` is the pool authority
    pub fn is_authority(&self, caller: &Identity) -> bool {
        self.authority == *caller
    }

    fn ensure_authority(&self, caller: &Identity) -> Result<()> {
        if self.is_authority(caller) {
            Ok(())
        } else {
            Err(PoolError::Unauthorized)
        }
    }

    /// `SCALE + cumulative_reward_ratio`
    pub fn reward_index(&self) -> Result<u128> {
        reward_index(self.cumulative_reward_ratio)
    }

    /// `SCALE - cumulative_burn_ratio`
    pub fn survival_index(&self) -> Result<u128> {
        SCALE
            .checked_sub(self.cumulative_burn_ratio)
            .ok_or(PoolError::ArithmeticOverflow)
    }

    /// Value currently backing `shares`, rounded down
    pub fn value_of(&self, shares: u128) -> Result<u64> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        to_amount(mul_div(shares, self.total_value as u128, self.total_shares)?)
    }

    /// Shares to burn for a partial withdrawal of `amount`, rounded down
    pub fn shares_for_withdrawal(&self, amount: u64) -> Result<u128> {
        mul_div(amount as u128, self.total_shares, self.total_value as u128)
    }

    /// `total_value += amount`, returning the shares minted for it.
    ///
    /// The first deposit into an empty pool mints `amount * SCALE` shares.
    /// Later deposits round the mint up so the new shares are never worth
    /// less than `amount`.
    pub fn record_deposit(&mut self, amount: u64) -> Result<u128> {
        let minted = if self.total_shares == 0 {
            (amount as u128)
                .checked_mul(SCALE)
                .ok_or(PoolError::ArithmeticOverflow)?
        } else {
            mul_div_up(amount as u128, self.total_shares, self.total_value as u128)?
        };
        let total_value = add_amount(self.total_value, amount)?;
        let total_shares = add_ratio(self.total_shares, minted)?;

        self.total_value = total_value;
        self.total_shares = total_shares;
        Ok(minted)
    }

    /// `total_value -= amount` and retire `shares`
    pub fn record_withdrawal(&mut self, amount: u64, shares: u128) -> Result<()> {
        let total_value = self.checked_debit(amount)?;
        let total_shares = self
            .total_shares
            .checked_sub(shares)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.total_value = total_value;
        self.total_shares = total_shares;
        Ok(())
    }

    /// Inject a reward of `amount` shared pro rata by every position.
    ///
    /// Compounds the reward index by `(total + amount) / total`, measured
    /// against the total before the injection. Returns the ratio delta.
    pub fn distribute(&mut self, caller: &Identity, amount: u64) -> Result<u128> {
        self.ensure_authority(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }

        let delta = mul_div(self.reward_index()?, amount as u128, self.total_value as u128)?;
        let reward_ratio = add_ratio(self.cumulative_reward_ratio, delta)?;
        let total_value = add_amount(self.total_value, amount)?;

        self.cumulative_reward_ratio = reward_ratio;
        self.total_value = total_value;
        Ok(delta)
    }

    /// Remove a penalty of `amount` shared pro rata by every position.
    ///
    /// Burning the whole total retires every outstanding share and starts a
    /// new epoch. Returns the burn ratio delta.
    pub fn burn(&mut self, caller: &Identity, amount: u64) -> Result<u128> {
        self.ensure_authority(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        if self.total_value == 0 {
            return Err(PoolError::EmptyPool);
        }

        let total_value = self.checked_debit(amount)?;
        // delta <= survival index because amount <= total
        let delta = mul_div(self.survival_index()?, amount as u128, self.total_value as u128)?;
        let burn_ratio = add_ratio(self.cumulative_burn_ratio, delta)?;

        self.cumulative_burn_ratio = burn_ratio;
        self.total_value = total_value;
        if total_value == 0 {
            self.total_shares = 0;
            self.epoch += 1;
        }
        Ok(delta)
    }

    /// Record an authority donation into the vault
    pub fn donate(&mut self, caller: &Identity, amount: u64) -> Result<()> {
        self.ensure_authority(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.donations = add_amount(self.donations, amount)?;
        Ok(())
    }

    /// Release `amount` of recorded donations back to the authority
    pub fn withdraw_donations(&mut self, caller: &Identity, amount: u64) -> Result<()> {
        self.ensure_authority(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.donations = self
            .donations
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientDonations {
                requested: amount,
                available: self.donations,
            })?;
        Ok(())
    }

    /// Value the vault must hold to honour every position and donation
    pub fn required_reserves(&self) -> Result<u64> {
        add_amount(self.total_value, self.donations)
    }

    fn checked_debit(&self, amount: u64) -> Result<u64> {
        self.total_value
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientLedgerValue {
                requested: amount,
                available: self.total_value,
            })
    }
}

/// `SCALE + ratio`, the reward index for a cumulative reward ratio
pub fn reward_index(ratio: u128) -> Result<u128> {
    add_ratio(SCALE, ratio)
}
