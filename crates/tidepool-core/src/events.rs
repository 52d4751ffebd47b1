//! Operation receipts and the per-pool event journal

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::settlement::Settlement;
use crate::types::{AssetId, Identity, PositionId};

/// Pool created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInitialized {
    pub asset: AssetId,
    pub authority: Identity,
    pub vault: Identity,
    pub timestamp: i64,
}

/// Empty position created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCreated {
    pub asset: AssetId,
    pub position: PositionId,
    pub owner: Identity,
    pub timestamp: i64,
}

/// Deposit into a position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staked {
    pub asset: AssetId,
    pub position: PositionId,
    pub owner: Identity,
    pub amount: u64,
    /// Settlement applied before the deposit
    pub settlement: Settlement,
    /// Position principal after the deposit
    pub principal: u64,
    /// Shares minted for the deposit
    pub minted: u128,
    /// Ledger total after the deposit
    pub total_value: u64,
    pub timestamp: i64,
}

/// Withdrawal from a position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unstaked {
    pub asset: AssetId,
    pub position: PositionId,
    pub owner: Identity,
    /// Value paid out to the owner
    pub payout: u64,
    /// Settlement applied before the withdrawal
    pub settlement: Settlement,
    /// Principal left in the position
    pub remaining: u64,
    /// Shares retired by the withdrawal
    pub retired: u128,
    /// Ledger total after the withdrawal
    pub total_value: u64,
    pub timestamp: i64,
}

/// Position re-based without a deposit or withdrawal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSettled {
    pub asset: AssetId,
    pub position: PositionId,
    pub settlement: Settlement,
    pub timestamp: i64,
}

/// Reward injected
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributed {
    pub asset: AssetId,
    pub amount: u64,
    pub ratio_delta: u128,
    pub cumulative_reward_ratio: u128,
    pub total_value: u64,
    pub timestamp: i64,
}

/// Penalty removed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burned {
    pub asset: AssetId,
    pub amount: u64,
    pub ratio_delta: u128,
    pub cumulative_burn_ratio: u128,
    pub total_value: u64,
    pub timestamp: i64,
}

/// Authority donation into the vault
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donated {
    pub asset: AssetId,
    pub amount: u64,
    /// Donations held after this call
    pub donations: u64,
    pub timestamp: i64,
}

/// Donations released back to the authority
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationsWithdrawn {
    pub asset: AssetId,
    pub amount: u64,
    /// Donations held after this call
    pub donations: u64,
    pub timestamp: i64,
}

/// Any journaled pool event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolEvent {
    PoolInitialized(PoolInitialized),
    PositionCreated(PositionCreated),
    Staked(Staked),
    Unstaked(Unstaked),
    PositionSettled(PositionSettled),
    Distributed(Distributed),
    Burned(Burned),
    Donated(Donated),
    DonationsWithdrawn(DonationsWithdrawn),
}

macro_rules! impl_from_receipt {
    ($($receipt:ident),* $(,)?) => {
        $(
            impl From<$receipt> for PoolEvent {
                fn from(receipt: $receipt) -> Self {
                    PoolEvent::$receipt(receipt)
                }
            }
        )*
    };
}

impl_from_receipt!(
    PoolInitialized,
    PositionCreated,
    Staked,
    Unstaked,
    PositionSettled,
    Distributed,
    Burned,
    Donated,
    DonationsWithdrawn,
);

impl PoolEvent {
    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PoolInitialized(_) => "pool_initialized",
            Self::PositionCreated(_) => "position_created",
            Self::Staked(_) => "staked",
            Self::Unstaked(_) => "unstaked",
            Self::PositionSettled(_) => "position_settled",
            Self::Distributed(_) => "distributed",
            Self::Burned(_) => "burned",
            Self::Donated(_) => "donated",
            Self::DonationsWithdrawn(_) => "donations_withdrawn",
        }
    }
}

/// Bounded in-memory event log; the oldest entries are dropped first
#[derive(Clone, Debug, Default)]
pub struct EventJournal {
    capacity: usize,
    events: VecDeque<PoolEvent>,
}

impl EventJournal {
    /// Create a journal keeping at most `capacity` events (0 disables it)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append an event
    pub fn record(&mut self, event: impl Into<PoolEvent>) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.into());
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing is retained
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Copy of the retained events, oldest first
    pub fn snapshot(&self) -> Vec<PoolEvent> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donated(amount: u64) -> Donated {
        Donated {
            asset: AssetId::from_name("RND"),
            amount,
            donations: amount,
            timestamp: 0,
        }
    }

    #[test]
    fn test_journal_drops_oldest() {
        let mut journal = EventJournal::new(2);
        journal.record(donated(1));
        journal.record(donated(2));
        journal.record(donated(3));

        let events = journal.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PoolEvent::Donated(donated(2)));
        assert_eq!(events[1], PoolEvent::Donated(donated(3)));
    }

    #[test]
    fn test_disabled_journal() {
        let mut journal = EventJournal::new(0);
        journal.record(donated(1));
        assert!(journal.is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = PoolEvent::from(donated(5));
        assert_eq!(event.name(), "donated");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["donated"]["amount"], 5);

        let back: PoolEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
