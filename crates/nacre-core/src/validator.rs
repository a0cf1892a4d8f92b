// crates/nacre-core/src/validator.rs
//
// Canonical validator record and its lifecycle state machine.
//
// A validator is never deleted. Stake fields are maintained by the
// bonding/unbonding queues and by slashing; the invariant
// `bonded_stake >= self_bonded_stake` holds at all times, and
// `self_bonded_stake >= self_unbonding_stake_locked` is restored at each
// epoch application even if slashing breaks it transiently.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::NacreError;
use crate::identity::Address;

/// Lifecycle state of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorState {
    /// Eligible for committee selection and new delegations.
    Active,
    /// Voluntarily paused by its treasury; excluded from the committee.
    Paused,
    /// Excluded until `jail_release_block` as a slashing penalty.
    Jailed,
    /// Permanently excluded. Terminal state.
    Jailbound,
}

/// A registered validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    /// Canonical address, derived from the node public key.
    pub address: Address,
    /// Account that funds self-bonding, collects commission, and is
    /// authorized to pause/activate/change the commission rate.
    pub treasury: Address,
    /// Oracle account address, derived from the oracle public key.
    pub oracle: Address,
    /// Node public key (ed25519).
    pub node_key: [u8; 32],
    /// Oracle public key (ed25519).
    pub oracle_key: [u8; 32],
    /// Total bonded stake, self-bonded included.
    pub bonded_stake: Amount,
    /// Stake bonded by the validator's own treasury. No liquid shares
    /// are minted against it.
    pub self_bonded_stake: Amount,
    /// Delegated stake currently in the unbonding pool.
    pub unbonding_stake: Amount,
    /// Shares outstanding against `unbonding_stake`.
    pub unbonding_shares: Amount,
    /// Self-bonded stake currently in the self-unbonding pool.
    pub self_unbonding_stake: Amount,
    /// Shares outstanding against `self_unbonding_stake`.
    pub self_unbonding_shares: Amount,
    /// Provisional hold on self-bonded stake between unbond enqueue and
    /// epoch application, so availability checks stay exact.
    pub self_unbonding_stake_locked: Amount,
    /// Total liquid shares minted for this validator's delegators.
    pub liquid_supply: Amount,
    /// Commission rate against RATE_PRECISION.
    pub commission_rate: u64,
    /// Cumulative stake taken by slashing.
    pub total_slashed: Amount,
    /// Lifetime count of proven faults.
    pub provable_fault_count: u64,
    /// First block at which a jailed validator may re-activate.
    pub jail_release_block: u64,
    /// Block at which the validator was registered (0 for genesis).
    pub registration_block: u64,
    pub state: ValidatorState,
}

impl Validator {
    /// Delegated (non-self) portion of the bonded stake.
    pub fn delegated_stake(&self) -> Amount {
        self.bonded_stake - self.self_bonded_stake
    }

    /// Total funds exposed to slashing: bonded plus both unbonding pools.
    pub fn slashable_stake(&self) -> Amount {
        self.bonded_stake + self.unbonding_stake + self.self_unbonding_stake
    }

    /// Transition Active -> Paused.
    pub fn pause(&mut self) -> Result<(), NacreError> {
        match self.state {
            ValidatorState::Active => {
                self.state = ValidatorState::Paused;
                Ok(())
            }
            from => Err(NacreError::IllegalTransition {
                from,
                to: ValidatorState::Paused,
            }),
        }
    }

    /// Transition Paused -> Active, or Jailed -> Active once the jail
    /// term has elapsed.
    pub fn activate(&mut self, current_block: u64) -> Result<(), NacreError> {
        match self.state {
            ValidatorState::Paused => {
                self.state = ValidatorState::Active;
                Ok(())
            }
            ValidatorState::Jailed if current_block > self.jail_release_block => {
                self.state = ValidatorState::Active;
                Ok(())
            }
            from => Err(NacreError::IllegalTransition {
                from,
                to: ValidatorState::Active,
            }),
        }
    }

    /// Jail the validator until `release_block`. Jailbound is terminal
    /// and cannot be re-entered from.
    pub fn jail(&mut self, release_block: u64) -> Result<(), NacreError> {
        match self.state {
            ValidatorState::Jailbound => Err(NacreError::IllegalTransition {
                from: ValidatorState::Jailbound,
                to: ValidatorState::Jailed,
            }),
            _ => {
                self.state = ValidatorState::Jailed;
                self.jail_release_block = release_block;
                Ok(())
            }
        }
    }

    /// Permanently ban the validator.
    pub fn jailbind(&mut self) {
        self.state = ValidatorState::Jailbound;
        self.jail_release_block = u64::MAX;
    }
}
