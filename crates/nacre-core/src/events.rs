// crates/nacre-core/src/events.rs
//
// Notifications emitted by the ledger. Observers (indexers, the consensus
// engine's event log) drain these after each external call; they carry no
// authority and replaying them has no effect on state.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::fault::Severity;
use crate::identity::Address;

/// An event emitted by the staking ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    RegisteredValidator {
        validator: Address,
        treasury: Address,
        oracle: Address,
    },
    PausedValidator {
        validator: Address,
    },
    ActivatedValidator {
        validator: Address,
    },
    NewBondingRequest {
        id: u64,
        validator: Address,
        delegator: Address,
        self_bonded: bool,
        amount: Amount,
    },
    NewUnbondingRequest {
        id: u64,
        validator: Address,
        delegator: Address,
        self_bonded: bool,
        amount: Amount,
    },
    /// Emitted when a queued commission-rate change takes effect.
    CommissionRateChange {
        validator: Address,
        rate: u64,
    },
    NewAccusation {
        id: u64,
        offender: Address,
        severity: Severity,
    },
    /// A directly submitted misbehavior proof, or an accusation promoted
    /// after its innocence window expired.
    NewFaultProof {
        id: u64,
        offender: Address,
        severity: Severity,
    },
    InnocenceProven {
        offender: Address,
        accusation_id: u64,
    },
    SlashingEvent {
        validator: Address,
        amount: Amount,
        release_block: u64,
        is_jailbound: bool,
        event_id: u64,
    },
    EpochEnded {
        epoch: u64,
    },
}
