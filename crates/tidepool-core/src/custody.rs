//! Value custody
//!
//! The pool never holds balances itself. It moves value through a
//! [`Custody`] implementation, and only after every check on the ledger
//! and position has passed.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{PoolError, Result};
use crate::types::{AssetId, Identity};

type BalanceMap = HashMap<(AssetId, Identity), u64>;

/// Atomic value-transfer capability
pub trait Custody: Send + Sync {
    /// Move `amount` of `asset` from `from` to `to`.
    ///
    /// Either both balances change or neither does. Fails with
    /// [`PoolError::InsufficientFunds`] if `from` holds less than `amount`.
    fn transfer(&self, asset: &AssetId, from: &Identity, to: &Identity, amount: u64) -> Result<()>;

    /// Current balance of `holder` in `asset`
    fn balance(&self, asset: &AssetId, holder: &Identity) -> u64;
}

/// In-memory custody ledger for simulation and tests
#[derive(Default)]
pub struct MemoryCustody {
    balances: RwLock<BalanceMap>,
}

impl MemoryCustody {
    /// Create an empty custody ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `asset` out of thin air for `to`
    pub fn mint(&self, asset: &AssetId, to: &Identity, amount: u64) -> Result<()> {
        let mut balances = self.balances.write();
        let balance = balances.entry((*asset, *to)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Sum of every balance held in `asset`
    pub fn supply(&self, asset: &AssetId) -> u128 {
        self.balances
            .read()
            .iter()
            .filter(|((a, _), _)| a == asset)
            .map(|(_, &amount)| amount as u128)
            .sum()
    }
}

impl Custody for MemoryCustody {
    fn transfer(&self, asset: &AssetId, from: &Identity, to: &Identity, amount: u64) -> Result<()> {
        let mut balances = self.balances.write();

        let available = balances.get(&(*asset, *from)).copied().unwrap_or(0);
        if available < amount {
            return Err(PoolError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        let credited = balances
            .get(&(*asset, *to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;

        balances.insert((*asset, *from), available - amount);
        balances.insert((*asset, *to), credited);
        Ok(())
    }

    fn balance(&self, asset: &AssetId, holder: &Identity) -> u64 {
        self.balances
            .read()
            .get(&(*asset, *holder))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemoryCustody, AssetId, Identity, Identity) {
        let custody = MemoryCustody::new();
        let asset = AssetId::from_name("RND");
        let alice = Identity::from_name("alice");
        let bob = Identity::from_name("bob");
        custody.mint(&asset, &alice, 100).unwrap();
        (custody, asset, alice, bob)
    }

    #[test]
    fn test_transfer() {
        let (custody, asset, alice, bob) = setup();
        custody.transfer(&asset, &alice, &bob, 40).unwrap();
        assert_eq!(custody.balance(&asset, &alice), 60);
        assert_eq!(custody.balance(&asset, &bob), 40);
        assert_eq!(custody.supply(&asset), 100);
    }

    #[test]
    fn test_insufficient_funds_leaves_balances() {
        let (custody, asset, alice, bob) = setup();
        let err = custody.transfer(&asset, &alice, &bob, 101).unwrap_err();
        assert_eq!(err, PoolError::InsufficientFunds { requested: 101, available: 100 });
        assert_eq!(custody.balance(&asset, &alice), 100);
        assert_eq!(custody.balance(&asset, &bob), 0);
    }

    #[test]
    fn test_assets_are_separate() {
        let (custody, asset, alice, bob) = setup();
        let other = AssetId::from_name("USDC");
        assert!(custody.transfer(&other, &alice, &bob, 1).is_err());
        assert_eq!(custody.balance(&other, &alice), 0);
        assert_eq!(custody.supply(&asset), 100);
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let (custody, asset, alice, _) = setup();
        custody.transfer(&asset, &alice, &alice, 100).unwrap();
        assert_eq!(custody.balance(&asset, &alice), 100);
    }

    #[test]
    fn test_mint_overflow() {
        let (custody, asset, alice, _) = setup();
        assert_eq!(
            custody.mint(&asset, &alice, u64::MAX),
            Err(PoolError::ArithmeticOverflow)
        );
        assert_eq!(custody.balance(&asset, &alice), 100);
    }
}
