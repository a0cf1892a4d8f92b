// crates/nacre-core/src/error.rs

use thiserror::Error;

use crate::amount::Amount;
use crate::identity::Address;
use crate::validator::ValidatorState;

/// Ledger-wide error type for the Nacre staking ledger.
///
/// Two families per the error taxonomy: validation errors (malformed or
/// unauthorized input) and precondition errors (economically impossible
/// at the current state). Both reject the operation atomically; no state
/// is mutated when an error is returned. Queue application at epoch end
/// is infallible by construction and therefore has no variant here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NacreError {
    /// Malformed or unauthorized input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cryptographic error (registration proof, key decoding).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// No validator registered under this address.
    #[error("unknown validator {0}")]
    UnknownValidator(Address),

    /// The target validator is not in the active state.
    #[error("validator {0} is not active")]
    ValidatorNotActive(Address),

    /// Illegal validator state transition.
    #[error("illegal validator state transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: ValidatorState,
        to: ValidatorState,
    },

    /// Base-token balance too low for the requested debit.
    #[error("insufficient balance: have {available} atto, need {requested} atto")]
    InsufficientBalance { available: Amount, requested: Amount },

    /// Liquid-share burn or transfer exceeding the unlocked balance.
    #[error("insufficient unlocked liquid shares: have {available}, need {requested}")]
    InsufficientUnlocked { available: Amount, requested: Amount },

    /// Locking more liquid shares than the holder's unlocked balance.
    #[error("lock of {requested} exceeds unlocked balance of {available}")]
    LockExceedsBalance { available: Amount, requested: Amount },

    /// Unlocking more liquid shares than are locked.
    #[error("unlock of {requested} exceeds locked amount of {available}")]
    UnlockExceedsLocked { available: Amount, requested: Amount },

    /// Self-unbonding more than the available self-bonded stake.
    #[error("insufficient self-bonded stake: have {available} atto, need {requested} atto")]
    InsufficientSelfBonded { available: Amount, requested: Amount },

    /// Unbonding more than the delegator's unlocked liquid shares.
    #[error("insufficient unlocked liquid stake: have {available}, need {requested}")]
    InsufficientUnlockedLiquid { available: Amount, requested: Amount },

    /// An unexpired accusation already exists for this offender and rule.
    #[error("accusation already outstanding for offender {0}")]
    AccusationOutstanding(Address),

    /// The offender was already slashed for that epoch at an equal or
    /// higher severity.
    #[error("offender {0} already slashed at equal or higher severity for that epoch")]
    AlreadySlashed(Address),

    /// Snapshot persistence failure.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}
