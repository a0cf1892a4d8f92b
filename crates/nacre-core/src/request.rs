// crates/nacre-core/src/request.rs
//
// Queued state-transition requests. All three request kinds follow the
// same shape: enqueue now, apply at an epoch boundary. Requests live in
// an append-only arena indexed by a monotonically increasing id; cursors
// over the arena live with the queues that process them.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::identity::Address;

/// A queued bonding request. Applied at the next epoch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondingRequest {
    /// Account whose stake balance was debited at enqueue time.
    pub delegator: Address,
    /// Validator being delegated to.
    pub delegatee: Address,
    /// Stake amount, in atto.
    pub amount: Amount,
    /// True when the delegator is the validator's treasury. No liquid
    /// shares are minted for self-bonding.
    pub self_bonded: bool,
    /// Block at which the request was enqueued.
    pub request_block: u64,
    /// Set once the epoch-end application has run.
    pub applied: bool,
}

/// A queued unbonding request.
///
/// Pending -> applied (liquid shares burned, unbonding shares issued) ->
/// released (shares redeemed for stake after the unbonding period).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnbondingRequest {
    pub delegator: Address,
    pub delegatee: Address,
    /// Requested amount: liquid shares for delegated stake, atto for
    /// self-bonded stake.
    pub amount: Amount,
    pub self_bonded: bool,
    pub request_block: u64,
    /// Unbonding shares issued at application time.
    pub unbonding_shares: Amount,
    pub applied: bool,
    pub released: bool,
}

/// A deferred commission-rate change. Takes effect at the first epoch
/// boundary at or after `effective_block`, which sits one unbonding
/// period past the request so a validator cannot front-run slashing with
/// an instant rate change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCommissionRate {
    pub validator: Address,
    /// New rate against RATE_PRECISION.
    pub rate: u64,
    pub effective_block: u64,
}
