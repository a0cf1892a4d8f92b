// crates/nacre-economics/src/rewards.rs
//
// Reward split arithmetic for the per-block reward pool.
//
// The pool splits as:
//   1. treasury fee = pool * treasury_fee_rate (10^18 fixed point)
//   2. remainder distributed per committee member proportional to
//      bonded stake
//   3. each member's share splits again: self reward (to the validator
//      treasury), commission (deducted inside the liquid ledger), and
//      the delegator residual (per-share accrual)
//
// All divisions floor; the sub-unit remainders are returned as dust and
// retained by the ledger, so payouts plus dust always equal the pool.

use nacre_core::{Address, Amount, TREASURY_FEE_PRECISION};

/// The stake-proportional split of one reward pool.
#[derive(Debug, Clone)]
pub struct RewardSplit {
    /// Fee routed to the global treasury.
    pub treasury_fee: Amount,
    /// Per-member reward shares, committee order preserved.
    pub member_shares: Vec<(Address, Amount)>,
    /// Rounding remainder retained by the ledger.
    pub dust: Amount,
}

/// Split `pool` into treasury fee, per-member shares, and retained dust.
///
/// `members` holds (address, bonded stake) pairs, normally the committee
/// weighted by the epoch's cached total bonded stake. An empty or
/// zero-stake membership routes everything but the fee into dust.
pub fn split_pool(
    pool: Amount,
    treasury_fee_rate: Amount,
    members: &[(Address, Amount)],
) -> RewardSplit {
    let treasury_fee = pool * treasury_fee_rate / TREASURY_FEE_PRECISION;
    let distributable = pool - treasury_fee;

    let total_stake: Amount = members.iter().map(|(_, stake)| stake).sum();
    if total_stake == 0 {
        return RewardSplit {
            treasury_fee,
            member_shares: Vec::new(),
            dust: distributable,
        };
    }

    let mut distributed = 0;
    let member_shares: Vec<(Address, Amount)> = members
        .iter()
        .map(|&(address, stake)| {
            let share = distributable * stake / total_stake;
            distributed += share;
            (address, share)
        })
        .collect();

    RewardSplit {
        treasury_fee,
        member_shares,
        dust: distributable - distributed,
    }
}

/// Split one member's reward share into the self-bonded part (paid to the
/// validator treasury) and the delegator part (fed to the liquid ledger,
/// which takes commission off the top).
pub fn split_member_reward(
    share: Amount,
    self_bonded_stake: Amount,
    bonded_stake: Amount,
) -> (Amount, Amount) {
    if bonded_stake == 0 {
        return (0, share);
    }
    let self_reward = share * self_bonded_stake / bonded_stake;
    (self_reward, share - self_reward)
}
