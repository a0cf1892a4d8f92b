// crates/nacre-accountability/src/slashing.rs
//
// Slashing-rate computation and penalty execution.
//
// The rate layers three components, capped at 100%:
//   base(severity) + epoch_offence_count * collusion_factor
//                  + provable_fault_count * history_factor
//
// Execution takes the computed amount from the validator's funds in
// strict priority order: self-unbonding stake, then self-bonded stake,
// then the remainder pro-rata between delegated bonded stake and
// delegated unbonding stake. Share supplies are untouched, so delegator
// instruments simply redeem against a smaller pool; a pool slashed to
// zero value has its outstanding shares burned with it.

use serde::{Deserialize, Serialize};
use tracing::info;

use nacre_core::{
    AccountabilityConfig, Address, Amount, NacreError, Severity, Validator, RATE_PRECISION,
};
use nacre_economics::Treasury;

/// Result of one executed slashing event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashOutcome {
    pub validator: Address,
    /// Applied rate against RATE_PRECISION.
    pub rate: u64,
    /// Stake transferred to the global treasury.
    pub amount: Amount,
    /// First block at which the validator may re-activate. `u64::MAX`
    /// when jailbound.
    pub release_block: u64,
    pub jailbound: bool,
    /// Id of the fault event that triggered the slash.
    pub event_id: u64,
}

/// Compute the slashing rate for one fault.
///
/// `epoch_offence_count` is the number of slashable offences attributed
/// across the network in the fault's epoch so far, this one included;
/// `fault_count` is the offender's lifetime proven-fault count before
/// this slash.
pub fn slashing_rate(
    config: &AccountabilityConfig,
    severity: Severity,
    epoch_offence_count: u64,
    fault_count: u64,
) -> u64 {
    let base = match severity {
        Severity::Low => config.base_slashing_rate_low,
        Severity::Mid => config.base_slashing_rate_mid,
        Severity::High => config.base_slashing_rate_high,
    };
    let rate = base
        .saturating_add(epoch_offence_count.saturating_mul(config.collusion_factor))
        .saturating_add(fault_count.saturating_mul(config.history_factor));
    rate.min(RATE_PRECISION)
}

/// Execute one slash against a validator at the given rate.
///
/// Deducts in priority order, credits the global treasury, increments
/// the fault counters, and jails the validator. A 100% rate or crossing
/// the lifetime-fault threshold makes the validator jailbound instead.
pub fn slash(
    validator: &mut Validator,
    treasury: &mut Treasury,
    config: &AccountabilityConfig,
    rate: u64,
    event_id: u64,
    current_block: u64,
    epoch_period: u64,
) -> Result<SlashOutcome, NacreError> {
    let available = validator.slashable_stake();
    let amount = available * rate as Amount / RATE_PRECISION as Amount;
    let mut remaining = amount;

    // 1. Self-unbonding stake.
    let taken = remaining.min(validator.self_unbonding_stake);
    validator.self_unbonding_stake -= taken;
    remaining -= taken;

    // 2. Self-bonded stake.
    let taken = remaining.min(validator.self_bonded_stake);
    validator.self_bonded_stake -= taken;
    validator.bonded_stake -= taken;
    remaining -= taken;

    // 3. Remainder pro-rata between delegated bonded and delegated
    //    unbonding stake.
    if remaining > 0 {
        let delegated_bonded = validator.delegated_stake();
        let pool = delegated_bonded + validator.unbonding_stake;
        if pool > 0 {
            let from_unbonding = remaining * validator.unbonding_stake / pool;
            let from_bonded = remaining - from_unbonding;
            validator.unbonding_stake -= from_unbonding;
            validator.bonded_stake -= from_bonded;
        }
    }

    // A pool emptied by the slash burns its outstanding shares; pending
    // releases against it redeem zero.
    if validator.unbonding_stake == 0 {
        validator.unbonding_shares = 0;
    }
    if validator.self_unbonding_stake == 0 {
        validator.self_unbonding_shares = 0;
    }

    treasury.deposit_stake(amount);
    validator.total_slashed += amount;
    validator.provable_fault_count += 1;

    let jailbound = rate >= RATE_PRECISION
        || validator.provable_fault_count >= config.jailbound_fault_threshold;
    let release_block = if jailbound {
        validator.jailbind();
        u64::MAX
    } else {
        let release = current_block
            + validator.provable_fault_count * config.jail_factor * epoch_period;
        validator.jail(release)?;
        release
    };

    info!(
        validator = %validator.address,
        rate,
        amount = %amount,
        jailbound,
        "validator slashed"
    );

    Ok(SlashOutcome {
        validator: validator.address,
        rate,
        amount,
        release_block,
        jailbound,
        event_id,
    })
}
