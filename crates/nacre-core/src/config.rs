// crates/nacre-core/src/config.rs
//
// Protocol configuration for the Nacre staking ledger.
// Deserializable from JSON with per-field defaults, so genesis files may
// specify only what they override.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::identity::Address;

/// Top-level protocol parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Account receiving the treasury fee and all slashed stake.
    #[serde(default = "default_treasury_account")]
    pub treasury_account: Address,

    /// Governance account allowed to mint and burn the stake token.
    #[serde(default = "default_operator_account")]
    pub operator_account: Address,

    /// Blocks per epoch.
    #[serde(default = "default_epoch_period")]
    pub epoch_period: u64,

    /// Blocks between an unbonding request's application and its release,
    /// and the deferral applied to commission-rate changes.
    #[serde(default = "default_unbonding_period")]
    pub unbonding_period: u64,

    /// Maximum committee size.
    #[serde(default = "default_max_committee_size")]
    pub max_committee_size: usize,

    /// Treasury's cut of each reward pool, against TREASURY_FEE_PRECISION.
    /// Default 1.5%.
    #[serde(default = "default_treasury_fee_rate")]
    pub treasury_fee_rate: Amount,

    /// Commission rate assigned to newly registered validators, against
    /// RATE_PRECISION. Default 10%.
    #[serde(default = "default_delegation_rate")]
    pub delegation_rate: u64,

    #[serde(default)]
    pub accountability: AccountabilityConfig,
}

/// Parameters of the accountability state machine and slashing formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountabilityConfig {
    /// Blocks an accused validator has to submit an innocence proof
    /// before the accusation is promoted to a fault.
    #[serde(default = "default_innocence_window")]
    pub innocence_proof_submission_window: u64,

    /// Base slashing rate for low-severity faults, against RATE_PRECISION.
    #[serde(default = "default_base_rate_low")]
    pub base_slashing_rate_low: u64,

    /// Base slashing rate for mid-severity faults, against RATE_PRECISION.
    #[serde(default = "default_base_rate_mid")]
    pub base_slashing_rate_mid: u64,

    /// Base slashing rate for high-severity faults, against RATE_PRECISION.
    #[serde(default = "default_base_rate_high")]
    pub base_slashing_rate_high: u64,

    /// Per-offence increment applied for each slashable offence seen in
    /// the same epoch (collusion penalty).
    #[serde(default = "default_collusion_factor")]
    pub collusion_factor: u64,

    /// Per-fault increment applied for the offender's lifetime fault
    /// count (recidivism penalty).
    #[serde(default = "default_history_factor")]
    pub history_factor: u64,

    /// Jail term multiplier: a validator with n proven faults is jailed
    /// for n * jail_factor * epoch_period blocks.
    #[serde(default = "default_jail_factor")]
    pub jail_factor: u64,

    /// Lifetime fault count at which a validator becomes permanently
    /// jailbound.
    #[serde(default = "default_jailbound_fault_threshold")]
    pub jailbound_fault_threshold: u64,
}

fn default_treasury_account() -> Address {
    Address([0xffu8; 20])
}

fn default_operator_account() -> Address {
    Address([0xeeu8; 20])
}

fn default_epoch_period() -> u64 {
    1_800
}

fn default_unbonding_period() -> u64 {
    21_600
}

fn default_max_committee_size() -> usize {
    100
}

fn default_treasury_fee_rate() -> Amount {
    15_000_000_000_000_000 // 1.5% of 10^18
}

fn default_delegation_rate() -> u64 {
    1_000 // 10%
}

fn default_innocence_window() -> u64 {
    100
}

fn default_base_rate_low() -> u64 {
    1_000 // 10%
}

fn default_base_rate_mid() -> u64 {
    2_000 // 20%
}

fn default_base_rate_high() -> u64 {
    4_000 // 40%
}

fn default_collusion_factor() -> u64 {
    500 // 5%
}

fn default_history_factor() -> u64 {
    750 // 7.5%
}

fn default_jail_factor() -> u64 {
    48
}

fn default_jailbound_fault_threshold() -> u64 {
    8
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

impl Default for AccountabilityConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.epoch_period, 1_800);
        assert_eq!(config.accountability.innocence_proof_submission_window, 100);
        assert_eq!(config.accountability.base_slashing_rate_low, 1_000);
        assert_eq!(config.accountability.collusion_factor, 500);
    }

    #[test]
    fn test_partial_override() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"epoch_period": 50, "accountability": {"jail_factor": 2}}"#)
                .unwrap();
        assert_eq!(config.epoch_period, 50);
        assert_eq!(config.accountability.jail_factor, 2);
        // Untouched fields fall back to defaults.
        assert_eq!(config.unbonding_period, 21_600);
        assert_eq!(config.accountability.history_factor, 750);
    }
}
