//! Scenario scripts replayed against an in-memory pool

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tidepool_core::prelude::*;
use tidepool_core::{PoolConfig, PoolEvent, PoolLedger, Settlement};

/// Walk-through used by `tidepool demo`
pub const DEMO_SCRIPT: &str = r#"
asset = "RND"
authority = "authority"

[airdrops]
authority = 1000
alice = 1000
bob = 1000
carol = 1000

[[steps]]
action = "create_position"
user = "alice"

[[steps]]
action = "create_position"
user = "bob"

[[steps]]
action = "create_position"
user = "carol"

[[steps]]
action = "stake"
user = "alice"
amount = 200

[[steps]]
action = "stake"
user = "bob"
amount = 400

[[steps]]
action = "distribute"
amount = 30

[[steps]]
action = "stake"
user = "carol"
amount = 200

[[steps]]
action = "burn"
amount = 20

[[steps]]
action = "unstake"
user = "alice"

[[steps]]
action = "unstake"
user = "alice"
expect_error = "nothing_to_withdraw"
"#;

/// Step kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreatePosition,
    Stake,
    Unstake,
    UnstakeAmount,
    Settle,
    Distribute,
    Burn,
    Donate,
    WithdrawDonations,
}

/// One scripted call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    /// Caller; authority actions default to the script authority
    #[serde(default)]
    pub user: Option<String>,
    /// Owner of the targeted position when it differs from the caller
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
    /// Error name this step must fail with
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// A full scenario
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Script {
    /// Asset name, hashed into an `AssetId`
    pub asset: String,
    /// Identity that initializes the pool
    pub authority: String,
    #[serde(default)]
    pub airdrops: BTreeMap<String, u64>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("invalid scenario script")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Replay every step and report the final pool state
    pub fn run(&self, config: PoolConfig) -> anyhow::Result<Report> {
        let mut sim = Simulation::new(self, config)?;
        for (index, step) in self.steps.iter().enumerate() {
            let outcome = sim.apply(step);
            match (&step.expect_error, outcome) {
                (None, Ok(())) => {}
                (None, Err(err)) => {
                    bail!("step {} ({:?}) failed: {} [{}]", index + 1, step.action, err, err.code())
                }
                (Some(expected), Ok(())) => {
                    bail!("step {} ({:?}) succeeded, expected {}", index + 1, step.action, expected)
                }
                (Some(expected), Err(err)) if err.name() == expected.as_str() => {
                    tracing::debug!(step = index + 1, error = %err, "Step failed as expected");
                }
                (Some(expected), Err(err)) => bail!(
                    "step {} ({:?}) failed with {}, expected {}",
                    index + 1,
                    step.action,
                    err.name(),
                    expected
                ),
            }
        }
        sim.report()
    }
}

/// Position state at the end of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionReport {
    pub owner: String,
    pub position: PositionId,
    /// Principal as stored, possibly lagging the ledger
    pub stored_principal: u64,
    /// What settling now would produce
    pub preview: Settlement,
    /// Owner's free balance in custody
    pub wallet: u64,
}

/// Outcome of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub events: Vec<PoolEvent>,
    pub ledger: PoolLedger,
    pub vault_balance: u64,
    pub positions: Vec<PositionReport>,
}

impl Report {
    pub fn position(&self, owner: &str) -> Option<&PositionReport> {
        self.positions.iter().find(|p| p.owner == owner)
    }
}

struct Simulation {
    custody: Arc<MemoryCustody>,
    pool: Arc<StakePool>,
    authority: Identity,
    names: BTreeMap<Identity, String>,
}

impl Simulation {
    fn new(script: &Script, config: PoolConfig) -> anyhow::Result<Self> {
        let custody = Arc::new(MemoryCustody::new());
        let asset = AssetId::from_name(&script.asset);
        let mut names = BTreeMap::new();

        for (name, amount) in &script.airdrops {
            let identity = Identity::from_name(name);
            custody.mint(&asset, &identity, *amount)?;
            names.insert(identity, name.clone());
        }

        let authority = Identity::from_name(&script.authority);
        names.insert(authority, script.authority.clone());

        let registry = PoolRegistry::new(config, custody.clone());
        let pool = registry
            .initialize_pool(&authority, &asset)
            .with_context(|| format!("cannot initialize pool as {}", script.authority))?;

        Ok(Self {
            custody,
            pool,
            authority,
            names,
        })
    }

    fn identity(&mut self, name: &str) -> Identity {
        let identity = Identity::from_name(name);
        self.names.entry(identity).or_insert_with(|| name.to_string());
        identity
    }

    fn apply(&mut self, step: &Step) -> std::result::Result<(), StepError> {
        let caller = match &step.user {
            Some(name) => self.identity(name),
            None => self.authority,
        };
        let position = match &step.owner {
            Some(name) => {
                let owner = self.identity(name);
                self.pool.position_id(&owner)
            }
            None => self.pool.position_id(&caller),
        };
        let amount = || step.amount.ok_or(StepError::MissingAmount);

        match step.action {
            Action::CreatePosition => self.pool.create_position(&caller).map(drop)?,
            Action::Stake => self.pool.stake(&caller, &position, amount()?).map(drop)?,
            Action::Unstake => self.pool.unstake(&caller, &position).map(drop)?,
            Action::UnstakeAmount => self
                .pool
                .unstake_amount(&caller, &position, amount()?)
                .map(drop)?,
            Action::Settle => self.pool.settle_position(&caller, &position).map(drop)?,
            Action::Distribute => self.pool.distribute(&caller, amount()?).map(drop)?,
            Action::Burn => self.pool.burn(&caller, amount()?).map(drop)?,
            Action::Donate => self.pool.donate(&caller, amount()?).map(drop)?,
            Action::WithdrawDonations => self.pool.withdraw_donations(&caller, amount()?).map(drop)?,
        }
        Ok(())
    }

    fn report(&self) -> anyhow::Result<Report> {
        let asset = self.pool.asset();
        let mut positions = Vec::new();
        for record in self.pool.positions() {
            let owner = self
                .names
                .get(&record.owner)
                .cloned()
                .ok_or_else(|| anyhow!("unnamed position owner {}", record.owner))?;
            positions.push(PositionReport {
                owner,
                position: record.id,
                stored_principal: record.principal,
                preview: self.pool.preview(&record.id)?,
                wallet: self.custody.balance(&asset, &record.owner),
            });
        }

        Ok(Report {
            events: self.pool.events(),
            ledger: self.pool.ledger(),
            vault_balance: self.custody.balance(&asset, &self.pool.vault()),
            positions,
        })
    }
}

/// Failure of a single step
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("step needs an `amount`")]
    MissingAmount,
}

impl StepError {
    fn name(&self) -> &'static str {
        match self {
            Self::Pool(err) => err.name(),
            Self::MissingAmount => "missing_amount",
        }
    }

    fn code(&self) -> u32 {
        match self {
            Self::Pool(err) => err.code(),
            Self::MissingAmount => 0,
        }
    }
}
