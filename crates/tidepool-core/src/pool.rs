//! # Stake Pool
//!
//! Owner-facing and authority-facing operations over one ledger and its
//! positions.
//!
//! ```text
//!   stake / unstake (owner)          distribute / burn (authority)
//!            │                                 │
//!            ▼                                 ▼
//!   settle(position, ledger)         advance cumulative ratio
//!            │                       adjust total_value
//!            ▼                                 │
//!   mutate principal + total_value             │
//!            │                                 │
//!            └──────────► custody transfer ◄───┘
//!                               │
//!                               ▼
//!                            commit
//! ```
//!
//! Ledger and positions share one lock. Each operation works on copies,
//! moves value through [`Custody`], and commits the copies only once the
//! transfer has succeeded.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::custody::Custody;
use crate::error::{PoolError, Result};
use crate::events::{
    Burned, Distributed, Donated, DonationsWithdrawn, EventJournal, PoolEvent, PoolInitialized,
    PositionCreated, PositionSettled, Staked, Unstaked,
};
use crate::ledger::PoolLedger;
use crate::math::{add_amount, add_ratio};
use crate::position::StakePosition;
use crate::settlement::{settle, Settlement};
use crate::types::{incinerator_address, vault_address, AssetId, Identity, PositionId};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Log authorization failures before handing them back
fn rejected(operation: &'static str, caller: &Identity, err: PoolError) -> PoolError {
    if matches!(err, PoolError::Unauthorized | PoolError::InvalidOwner) {
        tracing::warn!(operation, caller = %caller, error = %err, "Rejected pool operation");
    }
    err
}

/// Custody accounts the pool itself controls for `asset`
fn is_pool_account(caller: &Identity, asset: &AssetId) -> bool {
    *caller == vault_address(asset) || *caller == incinerator_address(asset)
}

struct PoolState {
    ledger: PoolLedger,
    positions: HashMap<PositionId, StakePosition>,
    journal: EventJournal,
}

impl PoolState {
    /// Look up a position the caller owns
    fn owned_position(&self, caller: &Identity, id: &PositionId) -> Result<&StakePosition> {
        let position = self
            .positions
            .get(id)
            .ok_or(PoolError::PositionNotFound(*id))?;
        if !position.is_owned_by(caller) {
            return Err(PoolError::InvalidOwner);
        }
        Ok(position)
    }
}

/// Value reconciliation across the vault, the ledger and every position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAudit {
    /// Balance held by the vault in custody
    pub vault_balance: u64,
    /// Ledger total owed to positions
    pub total_value: u64,
    /// Donations held in the vault
    pub donations: u64,
    /// Sum of every position's principal if settled now
    pub settled_principal: u128,
    /// Ledger share count
    pub total_shares: u128,
    /// Sum of every position's live shares
    pub position_shares: u128,
    /// Number of positions
    pub positions: usize,
}

impl PoolAudit {
    /// `total_value - settled_principal`: rounding dust kept by the pool.
    /// Below one unit per position while the shares are consistent.
    pub fn dust(&self) -> i128 {
        self.total_value as i128 - self.settled_principal as i128
    }

    /// Check if the positions hold exactly the ledger's shares
    pub fn shares_consistent(&self) -> bool {
        self.total_shares == self.position_shares
    }

    /// Check if the vault covers the ledger total and donations
    pub fn is_collateralized(&self) -> bool {
        self.vault_balance as u128 >= self.total_value as u128 + self.donations as u128
    }
}

/// Stake pool for a single asset
pub struct StakePool {
    asset: AssetId,
    vault: Identity,
    incinerator: Identity,
    custody: Arc<dyn Custody>,
    state: Mutex<PoolState>,
}

impl StakePool {
    /// Initialize a pool for `asset` governed by `authority`
    pub fn new(
        asset: AssetId,
        authority: Identity,
        custody: Arc<dyn Custody>,
        journal_capacity: usize,
    ) -> Self {
        let timestamp = now();
        let vault = vault_address(&asset);
        let mut journal = EventJournal::new(journal_capacity);
        journal.record(PoolInitialized {
            asset,
            authority,
            vault,
            timestamp,
        });

        tracing::info!(asset = %asset, authority = %authority, vault = %vault, "Initialized stake pool");

        Self {
            asset,
            vault,
            incinerator: incinerator_address(&asset),
            custody,
            state: Mutex::new(PoolState {
                ledger: PoolLedger::new(asset, authority, timestamp),
                positions: HashMap::new(),
                journal,
            }),
        }
    }

    /// Staked asset
    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// Custody account holding the pool's value
    pub fn vault(&self) -> Identity {
        self.vault
    }

    /// Custody account burned value is sent to
    pub fn incinerator(&self) -> Identity {
        self.incinerator
    }

    /// Pool authority
    pub fn authority(&self) -> Identity {
        self.state.lock().ledger.authority
    }

    /// Create an empty position owned by `caller`
    pub fn create_position(&self, caller: &Identity) -> Result<PositionCreated> {
        if is_pool_account(caller, &self.asset) {
            return Err(rejected("create_position", caller, PoolError::Unauthorized));
        }
        let mut state = self.state.lock();
        let id = PositionId::derive(caller, &self.asset);
        if state.positions.contains_key(&id) {
            return Err(PoolError::PositionExists(id));
        }

        let timestamp = now();
        let position = StakePosition::new(*caller, &state.ledger, timestamp);
        state.positions.insert(id, position);

        let receipt = PositionCreated {
            asset: self.asset,
            position: id,
            owner: *caller,
            timestamp,
        };
        state.journal.record(receipt.clone());

        tracing::info!(asset = %self.asset, position = %id, owner = %caller, "Created stake position");
        Ok(receipt)
    }

    /// Settle the position, then deposit `amount` from the caller into the vault
    pub fn stake(&self, caller: &Identity, id: &PositionId, amount: u64) -> Result<Staked> {
        // A vault self-transfer moves nothing, so the vault must never stake
        if is_pool_account(caller, &self.asset) {
            return Err(rejected("stake", caller, PoolError::Unauthorized));
        }
        let mut state = self.state.lock();
        let position = state
            .owned_position(caller, id)
            .map_err(|e| rejected("stake", caller, e))?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }

        let (mut position, settlement) = settle(position, &state.ledger)?;
        let mut ledger = state.ledger.clone();
        let minted = ledger.record_deposit(amount)?;
        position.principal = add_amount(position.principal, amount)?;
        position.shares = add_ratio(position.shares, minted)?;

        self.custody.transfer(&self.asset, caller, &self.vault, amount)?;

        let timestamp = now();
        position.last_staked_at = Some(timestamp);
        let receipt = Staked {
            asset: self.asset,
            position: *id,
            owner: *caller,
            amount,
            settlement,
            principal: position.principal,
            minted,
            total_value: ledger.total_value,
            timestamp,
        };

        state.positions.insert(*id, position);
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(
            asset = %self.asset,
            position = %id,
            amount,
            principal = receipt.principal,
            total_value = receipt.total_value,
            "Staked"
        );
        Ok(receipt)
    }

    /// Settle the position and withdraw all of it to the owner
    pub fn unstake(&self, caller: &Identity, id: &PositionId) -> Result<Unstaked> {
        self.withdraw(caller, id, None)
    }

    /// Settle the position and withdraw `amount` of it to the owner
    pub fn unstake_amount(&self, caller: &Identity, id: &PositionId, amount: u64) -> Result<Unstaked> {
        self.withdraw(caller, id, Some(amount))
    }

    fn withdraw(&self, caller: &Identity, id: &PositionId, amount: Option<u64>) -> Result<Unstaked> {
        let mut state = self.state.lock();
        let position = state
            .owned_position(caller, id)
            .map_err(|e| rejected("unstake", caller, e))?;
        if amount == Some(0) {
            return Err(PoolError::InvalidAmount);
        }

        let (mut position, settlement) = settle(position, &state.ledger)?;
        let available = position.principal;
        if available == 0 {
            return Err(PoolError::NothingToWithdraw);
        }
        let payout = amount.unwrap_or(available);
        if payout > available {
            return Err(PoolError::InsufficientFunds {
                requested: payout,
                available,
            });
        }

        // A full exit retires every share; a partial one rounds the retired
        // shares down, leaving the difference with the remaining holders
        let mut ledger = state.ledger.clone();
        let retired = if payout == available {
            position.shares
        } else {
            ledger.shares_for_withdrawal(payout)?
        };
        position.shares = position
            .shares
            .checked_sub(retired)
            .ok_or(PoolError::ArithmeticOverflow)?;
        position.principal = available - payout;
        ledger.record_withdrawal(payout, retired)?;

        self.custody.transfer(&self.asset, &self.vault, caller, payout)?;

        let timestamp = now();
        position.last_unstaked_at = Some(timestamp);
        let receipt = Unstaked {
            asset: self.asset,
            position: *id,
            owner: *caller,
            payout,
            settlement,
            remaining: position.principal,
            retired,
            total_value: ledger.total_value,
            timestamp,
        };

        state.positions.insert(*id, position);
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(
            asset = %self.asset,
            position = %id,
            payout,
            remaining = receipt.remaining,
            total_value = receipt.total_value,
            "Unstaked"
        );
        Ok(receipt)
    }

    /// Re-base the position against the ledger without moving value
    pub fn settle_position(&self, caller: &Identity, id: &PositionId) -> Result<PositionSettled> {
        let mut state = self.state.lock();
        let position = state
            .owned_position(caller, id)
            .map_err(|e| rejected("settle", caller, e))?;

        let (position, settlement) = settle(position, &state.ledger)?;
        let receipt = PositionSettled {
            asset: self.asset,
            position: *id,
            settlement,
            timestamp: now(),
        };

        state.positions.insert(*id, position);
        state.journal.record(receipt.clone());
        Ok(receipt)
    }

    /// Move a reward of `amount` from the authority into the vault and
    /// credit it pro rata to every position
    pub fn distribute(&self, caller: &Identity, amount: u64) -> Result<Distributed> {
        let mut state = self.state.lock();
        let mut ledger = state.ledger.clone();
        let ratio_delta = ledger
            .distribute(caller, amount)
            .map_err(|e| rejected("distribute", caller, e))?;

        self.custody.transfer(&self.asset, caller, &self.vault, amount)?;

        let receipt = Distributed {
            asset: self.asset,
            amount,
            ratio_delta,
            cumulative_reward_ratio: ledger.cumulative_reward_ratio,
            total_value: ledger.total_value,
            timestamp: now(),
        };
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(
            asset = %self.asset,
            amount,
            ratio_delta = %ratio_delta,
            reward_ratio = %receipt.cumulative_reward_ratio,
            total_value = receipt.total_value,
            "Distributed rewards"
        );
        Ok(receipt)
    }

    /// Burn `amount` out of the vault and debit it pro rata from every position
    pub fn burn(&self, caller: &Identity, amount: u64) -> Result<Burned> {
        let mut state = self.state.lock();
        let mut ledger = state.ledger.clone();
        let ratio_delta = ledger
            .burn(caller, amount)
            .map_err(|e| rejected("burn", caller, e))?;

        self.custody.transfer(&self.asset, &self.vault, &self.incinerator, amount)?;

        let receipt = Burned {
            asset: self.asset,
            amount,
            ratio_delta,
            cumulative_burn_ratio: ledger.cumulative_burn_ratio,
            total_value: ledger.total_value,
            timestamp: now(),
        };
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(
            asset = %self.asset,
            amount,
            ratio_delta = %ratio_delta,
            burn_ratio = %receipt.cumulative_burn_ratio,
            total_value = receipt.total_value,
            "Burned"
        );
        Ok(receipt)
    }

    /// Move a donation from the authority into the vault, outside staker value
    pub fn donate(&self, caller: &Identity, amount: u64) -> Result<Donated> {
        let mut state = self.state.lock();
        let mut ledger = state.ledger.clone();
        ledger
            .donate(caller, amount)
            .map_err(|e| rejected("donate", caller, e))?;

        self.custody.transfer(&self.asset, caller, &self.vault, amount)?;

        let receipt = Donated {
            asset: self.asset,
            amount,
            donations: ledger.donations,
            timestamp: now(),
        };
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(asset = %self.asset, amount, donations = receipt.donations, "Received donation");
        Ok(receipt)
    }

    /// Return `amount` of recorded donations to the authority
    pub fn withdraw_donations(&self, caller: &Identity, amount: u64) -> Result<DonationsWithdrawn> {
        let mut state = self.state.lock();
        let mut ledger = state.ledger.clone();
        ledger
            .withdraw_donations(caller, amount)
            .map_err(|e| rejected("withdraw_donations", caller, e))?;

        self.custody.transfer(&self.asset, &self.vault, caller, amount)?;

        let receipt = DonationsWithdrawn {
            asset: self.asset,
            amount,
            donations: ledger.donations,
            timestamp: now(),
        };
        state.ledger = ledger;
        state.journal.record(receipt.clone());

        tracing::info!(asset = %self.asset, amount, donations = receipt.donations, "Withdrew donations");
        Ok(receipt)
    }

    /// Snapshot of the ledger
    pub fn ledger(&self) -> PoolLedger {
        self.state.lock().ledger.clone()
    }

    /// Stored (possibly unsettled) position record
    pub fn position(&self, id: &PositionId) -> Option<StakePosition> {
        self.state.lock().positions.get(id).cloned()
    }

    /// Position id for `owner` in this pool
    pub fn position_id(&self, owner: &Identity) -> PositionId {
        PositionId::derive(owner, &self.asset)
    }

    /// What settling the position now would produce, without mutating it
    pub fn preview(&self, id: &PositionId) -> Result<Settlement> {
        let state = self.state.lock();
        let position = state
            .positions
            .get(id)
            .ok_or(PoolError::PositionNotFound(*id))?;
        settle(position, &state.ledger).map(|(_, settlement)| settlement)
    }

    /// Stored records of every position
    pub fn positions(&self) -> Vec<StakePosition> {
        let state = self.state.lock();
        let mut positions: Vec<_> = state.positions.values().cloned().collect();
        positions.sort_by_key(|p| (p.created_at, p.id));
        positions
    }

    /// Journaled events, oldest first
    pub fn events(&self) -> Vec<PoolEvent> {
        self.state.lock().journal.snapshot()
    }

    /// Reconcile custody, ledger and positions.
    ///
    /// Visits every position; meant for diagnostics, never called by the
    /// operations above.
    pub fn audit(&self) -> Result<PoolAudit> {
        let state = self.state.lock();
        let mut settled_principal = 0u128;
        let mut position_shares = 0u128;
        for position in state.positions.values() {
            let (settled, settlement) = settle(position, &state.ledger)?;
            settled_principal += settlement.principal_after as u128;
            position_shares = add_ratio(position_shares, settled.shares)?;
        }

        Ok(PoolAudit {
            vault_balance: self.custody.balance(&self.asset, &self.vault),
            total_value: state.ledger.total_value,
            donations: state.ledger.donations,
            settled_principal,
            total_shares: state.ledger.total_shares,
            position_shares,
            positions: state.positions.len(),
        })
    }
}

/// All pools, one per asset
pub struct PoolRegistry {
    config: PoolConfig,
    custody: Arc<dyn Custody>,
    pools: RwLock<HashMap<AssetId, Arc<StakePool>>>,
}

impl PoolRegistry {
    /// Create an empty registry
    pub fn new(config: PoolConfig, custody: Arc<dyn Custody>) -> Self {
        Self {
            config,
            custody,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Create the pool for `asset`; `caller` becomes its authority
    pub fn initialize_pool(&self, caller: &Identity, asset: &AssetId) -> Result<Arc<StakePool>> {
        if is_pool_account(caller, asset) {
            return Err(rejected("initialize_pool", caller, PoolError::Unauthorized));
        }
        if let Some(program_authority) = &self.config.program_authority {
            if program_authority != caller {
                return Err(rejected("initialize_pool", caller, PoolError::Unauthorized));
            }
        }

        let mut pools = self.pools.write();
        if pools.contains_key(asset) {
            return Err(PoolError::AlreadyInitialized(*asset));
        }

        let pool = Arc::new(StakePool::new(
            *asset,
            *caller,
            Arc::clone(&self.custody),
            self.config.journal_capacity,
        ));
        pools.insert(*asset, Arc::clone(&pool));
        Ok(pool)
    }

    /// Pool for `asset`
    pub fn pool(&self, asset: &AssetId) -> Result<Arc<StakePool>> {
        self.pools
            .read()
            .get(asset)
            .cloned()
            .ok_or(PoolError::PoolNotFound(*asset))
    }

    /// Every asset with a pool
    pub fn assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<_> = self.pools.read().keys().copied().collect();
        assets.sort();
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::MemoryCustody;
    use crate::math::SCALE;

    struct Fixture {
        custody: Arc<MemoryCustody>,
        pool: StakePool,
        authority: Identity,
        asset: AssetId,
    }

    impl Fixture {
        fn new() -> Self {
            let custody = Arc::new(MemoryCustody::new());
            let asset = AssetId::from_name("RND");
            let authority = Identity::from_name("authority");
            custody.mint(&asset, &authority, 1_000_000).unwrap();
            let pool = StakePool::new(asset, authority, custody.clone(), 64);
            Self { custody, pool, authority, asset }
        }

        fn user(&self, name: &str, airdrop: u64) -> (Identity, PositionId) {
            let user = Identity::from_name(name);
            self.custody.mint(&self.asset, &user, airdrop).unwrap();
            let created = self.pool.create_position(&user).unwrap();
            (user, created.position)
        }

        fn balance(&self, who: &Identity) -> u64 {
            self.custody.balance(&self.asset, who)
        }
    }

    #[test]
    fn test_create_position_once() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 0);
        assert_eq!(id, f.pool.position_id(&alice));
        assert_eq!(f.pool.create_position(&alice), Err(PoolError::PositionExists(id)));
        assert!(f.pool.position(&id).unwrap().is_empty());
    }

    #[test]
    fn test_stake_moves_funds_and_credits_ledger() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 500);

        let receipt = f.pool.stake(&alice, &id, 200).unwrap();
        assert_eq!(receipt.principal, 200);
        assert_eq!(receipt.total_value, 200);
        assert_eq!(f.balance(&alice), 300);
        assert_eq!(f.balance(&f.pool.vault()), 200);
        assert!(f.pool.position(&id).unwrap().last_staked_at.is_some());
    }

    #[test]
    fn test_stake_zero_rejected() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 500);
        assert_eq!(f.pool.stake(&alice, &id, 0), Err(PoolError::InvalidAmount));
    }

    #[test]
    fn test_stake_without_funds_leaves_state() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 50);

        let err = f.pool.stake(&alice, &id, 51).unwrap_err();
        assert_eq!(err, PoolError::InsufficientFunds { requested: 51, available: 50 });
        assert_eq!(f.pool.ledger().total_value, 0);
        assert_eq!(f.pool.position(&id).unwrap().principal, 0);
        assert_eq!(f.balance(&alice), 50);
    }

    #[test]
    fn test_only_owner_can_stake_or_unstake() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        let (mallory, _) = f.user("mallory", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        assert_eq!(f.pool.stake(&mallory, &id, 10), Err(PoolError::InvalidOwner));
        assert_eq!(f.pool.unstake(&mallory, &id), Err(PoolError::InvalidOwner));
        assert_eq!(f.pool.settle_position(&mallory, &id), Err(PoolError::InvalidOwner));
        assert_eq!(f.pool.position(&id).unwrap().principal, 100);
        assert_eq!(f.balance(&mallory), 100);
    }

    #[test]
    fn test_unknown_position() {
        let f = Fixture::new();
        let ghost = Identity::from_name("ghost");
        let id = f.pool.position_id(&ghost);
        assert_eq!(f.pool.stake(&ghost, &id, 1), Err(PoolError::PositionNotFound(id)));
        assert_eq!(f.pool.preview(&id), Err(PoolError::PositionNotFound(id)));
    }

    #[test]
    fn test_unstake_empty_position() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        let before = f.pool.position(&id).unwrap();

        assert_eq!(f.pool.unstake(&alice, &id), Err(PoolError::NothingToWithdraw));
        assert_eq!(f.pool.position(&id).unwrap(), before);
    }

    #[test]
    fn test_distribute_then_unstake_pays_reward() {
        let f = Fixture::new();
        let (alice, a) = f.user("alice", 200);
        let (bob, b) = f.user("bob", 400);
        f.pool.stake(&alice, &a, 200).unwrap();
        f.pool.stake(&bob, &b, 400).unwrap();

        let distributed = f.pool.distribute(&f.authority, 30).unwrap();
        assert_eq!(distributed.ratio_delta, 30 * SCALE / 600);
        assert_eq!(distributed.total_value, 630);

        let unstaked = f.pool.unstake(&alice, &a).unwrap();
        assert_eq!(unstaked.payout, 210);
        assert_eq!(unstaked.settlement.reward, 10);
        assert_eq!(f.balance(&alice), 210);
        assert_eq!(f.pool.ledger().total_value, 420);

        let unstaked = f.pool.unstake(&bob, &b).unwrap();
        assert_eq!(unstaked.payout, 420);
        assert_eq!(f.pool.ledger().total_value, 0);
        assert_eq!(f.balance(&f.pool.vault()), 0);
    }

    #[test]
    fn test_distribute_requires_authority() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        assert_eq!(f.pool.distribute(&alice, 10), Err(PoolError::Unauthorized));
        assert_eq!(f.pool.burn(&alice, 10), Err(PoolError::Unauthorized));
        let ledger = f.pool.ledger();
        assert_eq!(ledger.cumulative_reward_ratio, 0);
        assert_eq!(ledger.cumulative_burn_ratio, 0);
        assert_eq!(ledger.total_value, 100);
    }

    #[test]
    fn test_distribute_on_empty_pool() {
        let f = Fixture::new();
        assert_eq!(f.pool.distribute(&f.authority, 10), Err(PoolError::EmptyPool));
        assert_eq!(f.balance(&f.authority), 1_000_000);
    }

    #[test]
    fn test_burn_moves_funds_to_incinerator() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        let burned = f.pool.burn(&f.authority, 25).unwrap();
        assert_eq!(burned.total_value, 75);
        assert_eq!(f.balance(&f.pool.incinerator()), 25);
        assert_eq!(f.balance(&f.pool.vault()), 75);

        assert_eq!(f.pool.unstake(&alice, &id).unwrap().payout, 75);
    }

    #[test]
    fn test_partial_unstake() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        assert_eq!(f.pool.unstake_amount(&alice, &id, 0), Err(PoolError::InvalidAmount));
        assert_eq!(
            f.pool.unstake_amount(&alice, &id, 101),
            Err(PoolError::InsufficientFunds { requested: 101, available: 100 })
        );

        let receipt = f.pool.unstake_amount(&alice, &id, 40).unwrap();
        assert_eq!(receipt.payout, 40);
        assert_eq!(receipt.remaining, 60);
        assert_eq!(f.pool.ledger().total_value, 60);
        assert_eq!(f.balance(&alice), 40);
    }

    #[test]
    fn test_donations_stay_outside_staker_value() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        f.pool.donate(&f.authority, 50).unwrap();
        let ledger = f.pool.ledger();
        assert_eq!(ledger.total_value, 100);
        assert_eq!(ledger.donations, 50);
        assert_eq!(f.balance(&f.pool.vault()), 150);

        assert_eq!(
            f.pool.withdraw_donations(&f.authority, 60),
            Err(PoolError::InsufficientDonations { requested: 60, available: 50 })
        );
        assert_eq!(f.pool.withdraw_donations(&alice, 10), Err(PoolError::Unauthorized));

        f.pool.withdraw_donations(&f.authority, 50).unwrap();
        assert_eq!(f.pool.unstake(&alice, &id).unwrap().payout, 100);
        assert_eq!(f.balance(&f.pool.vault()), 0);
    }

    #[test]
    fn test_settle_position_is_idempotent() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 300);
        f.pool.stake(&alice, &id, 300).unwrap();
        f.pool.distribute(&f.authority, 30).unwrap();

        let first = f.pool.settle_position(&alice, &id).unwrap();
        assert_eq!(first.settlement.principal_after, 330);
        let second = f.pool.settle_position(&alice, &id).unwrap();
        assert!(second.settlement.is_noop());
        assert_eq!(f.pool.position(&id).unwrap().principal, 330);
    }

    #[test]
    fn test_audit() {
        let f = Fixture::new();
        let (alice, a) = f.user("alice", 100);
        let (bob, b) = f.user("bob", 200);
        f.pool.stake(&alice, &a, 100).unwrap();
        f.pool.stake(&bob, &b, 200).unwrap();
        f.pool.distribute(&f.authority, 10).unwrap();
        f.pool.donate(&f.authority, 5).unwrap();

        let audit = f.pool.audit().unwrap();
        assert_eq!(audit.positions, 2);
        assert_eq!(audit.total_value, 310);
        assert_eq!(audit.vault_balance, 315);
        assert!(audit.is_collateralized());
        assert!(audit.shares_consistent());
        // exact shares are 103.3 and 206.7
        assert_eq!(audit.settled_principal, 103 + 206);
        assert_eq!(audit.dust(), 1);
    }

    #[test]
    fn test_unsettled_distributions_compound() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();
        f.pool.distribute(&f.authority, 100).unwrap();
        f.pool.distribute(&f.authority, 200).unwrap();

        let unstaked = f.pool.unstake(&alice, &id).unwrap();
        assert_eq!(unstaked.payout, 400);
        assert_eq!(unstaked.settlement.reward, 300);
        assert_eq!(unstaked.total_value, 0);
        assert_eq!(f.pool.ledger().total_shares, 0);
        assert_eq!(f.balance(&f.pool.vault()), 0);
    }

    #[test]
    fn test_last_staker_exits_after_burn() {
        let f = Fixture::new();
        let (alice, a) = f.user("alice", 3);
        let (bob, b) = f.user("bob", 2);
        f.pool.stake(&alice, &a, 3).unwrap();
        f.pool.stake(&bob, &b, 2).unwrap();
        f.pool.burn(&f.authority, 1).unwrap();

        // alice is owed 2.4 and bob 1.6 of the remaining 4
        assert_eq!(f.pool.unstake(&alice, &a).unwrap().payout, 2);
        let last = f.pool.unstake(&bob, &b).unwrap();
        assert_eq!(last.payout, 2);
        assert_eq!(last.total_value, 0);
        assert_eq!(f.balance(&f.pool.vault()), 0);
        assert_eq!(f.balance(&alice) + f.balance(&bob), 4);
    }

    #[test]
    fn test_burn_below_one_unit_each_is_never_overpaid() {
        let f = Fixture::new();
        let (alice, a) = f.user("alice", 2);
        let (bob, b) = f.user("bob", 1);
        f.pool.stake(&alice, &a, 1).unwrap();
        f.pool.stake(&bob, &b, 1).unwrap();
        f.pool.burn(&f.authority, 1).unwrap();

        // half a unit each rounds down for both
        assert_eq!(f.pool.unstake(&alice, &a), Err(PoolError::NothingToWithdraw));
        assert_eq!(f.pool.unstake(&bob, &b), Err(PoolError::NothingToWithdraw));
        let audit = f.pool.audit().unwrap();
        assert_eq!(audit.dust(), 1);
        assert!(audit.dust() < audit.positions as i128);

        // the stranded half units still belong to their holders
        f.pool.stake(&alice, &a, 1).unwrap();
        assert_eq!(f.pool.unstake(&alice, &a).unwrap().payout, 1);
        assert_eq!(f.pool.unstake(&bob, &b).unwrap().payout, 1);
        assert_eq!(f.pool.ledger().total_value, 0);
        assert_eq!(f.balance(&f.pool.vault()), 0);
    }

    #[test]
    fn test_stake_after_total_burn_starts_fresh() {
        let f = Fixture::new();
        let (alice, a) = f.user("alice", 100);
        let (bob, b) = f.user("bob", 50);
        f.pool.stake(&alice, &a, 100).unwrap();
        f.pool.burn(&f.authority, 100).unwrap();
        assert_eq!(f.pool.ledger().epoch, 1);

        f.pool.stake(&bob, &b, 50).unwrap();
        let preview = f.pool.preview(&a).unwrap();
        assert_eq!(preview.burned, 100);
        assert_eq!(preview.principal_after, 0);
        assert_eq!(f.pool.unstake(&alice, &a), Err(PoolError::NothingToWithdraw));
        assert_eq!(f.pool.unstake(&bob, &b).unwrap().payout, 50);
    }

    #[test]
    fn test_pool_accounts_cannot_hold_positions() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 100);
        f.pool.stake(&alice, &id, 100).unwrap();

        for account in [f.pool.vault(), f.pool.incinerator()] {
            assert_eq!(f.pool.create_position(&account), Err(PoolError::Unauthorized));
            let own = f.pool.position_id(&account);
            assert_eq!(f.pool.stake(&account, &own, 50), Err(PoolError::Unauthorized));
            assert_eq!(f.pool.position(&own), None);
        }
        assert_eq!(f.pool.ledger().total_value, 100);
        assert_eq!(f.balance(&f.pool.vault()), 100);
    }

    #[test]
    fn test_journal_records_operations() {
        let f = Fixture::new();
        let (alice, id) = f.user("alice", 10);
        f.pool.stake(&alice, &id, 10).unwrap();
        let _ = f.pool.stake(&alice, &id, 0);

        let names: Vec<_> = f.pool.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["pool_initialized", "position_created", "staked"]);
    }

    #[test]
    fn test_registry_rejects_second_initialize() {
        let custody = Arc::new(MemoryCustody::new());
        let registry = PoolRegistry::new(PoolConfig::default(), custody);
        let asset = AssetId::from_name("RND");
        let authority = Identity::from_name("authority");

        let pool = registry.initialize_pool(&authority, &asset).unwrap();
        assert_eq!(pool.authority(), authority);
        assert_eq!(
            registry.initialize_pool(&authority, &asset).err(),
            Some(PoolError::AlreadyInitialized(asset))
        );
        assert_eq!(registry.assets(), vec![asset]);
        assert!(Arc::ptr_eq(&registry.pool(&asset).unwrap(), &pool));
    }

    #[test]
    fn test_registry_program_authority() {
        let program_authority = Identity::from_name("program");
        let config = PoolConfig {
            program_authority: Some(program_authority),
            ..PoolConfig::default()
        };
        let registry = PoolRegistry::new(config, Arc::new(MemoryCustody::new()));
        let asset = AssetId::from_name("RND");

        assert_eq!(
            registry.initialize_pool(&Identity::from_name("intruder"), &asset).err(),
            Some(PoolError::Unauthorized)
        );
        assert_eq!(
            registry.pool(&asset).err(),
            Some(PoolError::PoolNotFound(asset))
        );
        assert!(registry.initialize_pool(&program_authority, &asset).is_ok());
    }

    #[test]
    fn test_registry_rejects_pool_account_as_authority() {
        let registry = PoolRegistry::new(PoolConfig::default(), Arc::new(MemoryCustody::new()));
        let asset = AssetId::from_name("RND");

        assert_eq!(
            registry.initialize_pool(&vault_address(&asset), &asset).err(),
            Some(PoolError::Unauthorized)
        );
        assert_eq!(
            registry.initialize_pool(&incinerator_address(&asset), &asset).err(),
            Some(PoolError::Unauthorized)
        );
        assert!(registry.assets().is_empty());
    }
}
