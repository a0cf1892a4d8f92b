// crates/nacre-staking/src/registry.rs
//
// The validator registry: canonical validator records, their liquid
// share ledgers, and the deferred commission-rate queue.
//
// Records are keyed by the validator address in a BTreeMap so epoch
// processing iterates in the same order on every node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use nacre_core::{
    Address, NacreError, PendingCommissionRate, RegistrationProof, Validator, ValidatorState,
    RATE_PRECISION,
};
use nacre_economics::LiquidLedger;

/// Registry of all validators ever registered. Validators are never
/// removed; a permanently banned validator stays as a jailbound record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    validators: BTreeMap<Address, Validator>,
    liquid: BTreeMap<Address, LiquidLedger>,
    pending_rates: Vec<PendingCommissionRate>,
    rate_head: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new validator.
    ///
    /// The validator address derives from the node public key in the
    /// proof; both proof signatures must cover the treasury address.
    ///
    /// # Errors
    /// `NacreError::Crypto` on a bad proof, `NacreError::Validation` on a
    /// duplicate registration or an out-of-range commission rate.
    pub fn register(
        &mut self,
        treasury: Address,
        proof: &RegistrationProof,
        commission_rate: u64,
        current_block: u64,
    ) -> Result<Address, NacreError> {
        if commission_rate > RATE_PRECISION {
            return Err(NacreError::Validation(format!(
                "commission rate {} exceeds precision {}",
                commission_rate, RATE_PRECISION
            )));
        }
        proof.verify(&treasury)?;

        let address = Address::from_public_key(&proof.node_key);
        if self.validators.contains_key(&address) {
            return Err(NacreError::Validation(format!(
                "validator {} is already registered",
                address
            )));
        }

        let validator = Validator {
            address,
            treasury,
            oracle: Address::from_public_key(&proof.oracle_key),
            node_key: proof.node_key,
            oracle_key: proof.oracle_key,
            bonded_stake: 0,
            self_bonded_stake: 0,
            unbonding_stake: 0,
            unbonding_shares: 0,
            self_unbonding_stake: 0,
            self_unbonding_shares: 0,
            self_unbonding_stake_locked: 0,
            liquid_supply: 0,
            commission_rate,
            total_slashed: 0,
            provable_fault_count: 0,
            jail_release_block: 0,
            registration_block: current_block,
            state: ValidatorState::Active,
        };
        info!(validator = %address, %treasury, "validator registered");
        self.liquid
            .insert(address, LiquidLedger::new(address, commission_rate));
        self.validators.insert(address, validator);
        Ok(address)
    }

    /// Seed a validator record directly, bypassing proof verification and
    /// the queues. Genesis only.
    pub fn insert_genesis(&mut self, validator: Validator) {
        self.liquid.insert(
            validator.address,
            LiquidLedger::new(validator.address, validator.commission_rate),
        );
        self.validators.insert(validator.address, validator);
    }

    pub fn contains(&self, validator: &Address) -> bool {
        self.validators.contains_key(validator)
    }

    pub fn get(&self, validator: &Address) -> Result<&Validator, NacreError> {
        self.validators
            .get(validator)
            .ok_or(NacreError::UnknownValidator(*validator))
    }

    pub fn get_mut(&mut self, validator: &Address) -> Result<&mut Validator, NacreError> {
        self.validators
            .get_mut(validator)
            .ok_or(NacreError::UnknownValidator(*validator))
    }

    pub fn liquid_of(&self, validator: &Address) -> Result<&LiquidLedger, NacreError> {
        self.liquid
            .get(validator)
            .ok_or(NacreError::UnknownValidator(*validator))
    }

    pub fn liquid_of_mut(&mut self, validator: &Address) -> Result<&mut LiquidLedger, NacreError> {
        self.liquid
            .get_mut(validator)
            .ok_or(NacreError::UnknownValidator(*validator))
    }

    /// Borrow a validator record together with its liquid ledger.
    pub fn record_mut(
        &mut self,
        validator: &Address,
    ) -> Result<(&mut Validator, &mut LiquidLedger), NacreError> {
        let record = self
            .validators
            .get_mut(validator)
            .ok_or(NacreError::UnknownValidator(*validator))?;
        let liquid = self
            .liquid
            .get_mut(validator)
            .ok_or(NacreError::UnknownValidator(*validator))?;
        Ok((record, liquid))
    }

    /// All validator records, in address order.
    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Voluntary pause by the validator's treasury.
    ///
    /// # Errors
    /// `NacreError::Validation` for a non-treasury caller,
    /// `NacreError::IllegalTransition` if not currently active.
    pub fn pause(&mut self, caller: Address, validator: Address) -> Result<(), NacreError> {
        let record = self.get_mut(&validator)?;
        require_treasury(record, caller)?;
        record.pause()?;
        info!(validator = %validator, "validator paused");
        Ok(())
    }

    /// Re-activate a paused validator, or a jailed one whose term has
    /// elapsed.
    pub fn activate(
        &mut self,
        caller: Address,
        validator: Address,
        current_block: u64,
    ) -> Result<(), NacreError> {
        let record = self.get_mut(&validator)?;
        require_treasury(record, caller)?;
        record.activate(current_block)?;
        info!(validator = %validator, "validator activated");
        Ok(())
    }

    /// Queue a commission-rate change, effective one unbonding period
    /// out. Applied at the first epoch boundary past that point.
    pub fn change_commission_rate(
        &mut self,
        caller: Address,
        validator: Address,
        rate: u64,
        effective_block: u64,
    ) -> Result<(), NacreError> {
        if rate > RATE_PRECISION {
            return Err(NacreError::Validation(format!(
                "commission rate {} exceeds precision {}",
                rate, RATE_PRECISION
            )));
        }
        let record = self.get_mut(&validator)?;
        require_treasury(record, caller)?;
        self.pending_rates.push(PendingCommissionRate {
            validator,
            rate,
            effective_block,
        });
        Ok(())
    }

    /// Apply every queued rate change whose effective block has passed.
    /// Returns the applied (validator, rate) pairs for event emission.
    pub fn apply_pending_rates(&mut self, current_block: u64) -> Vec<(Address, u64)> {
        let mut applied = Vec::new();
        while self.rate_head < self.pending_rates.len() {
            let pending = self.pending_rates[self.rate_head].clone();
            if pending.effective_block > current_block {
                break;
            }
            self.rate_head += 1;
            // The validator existed at enqueue time and is never deleted.
            if let Ok(record) = self.get_mut(&pending.validator) {
                record.commission_rate = pending.rate;
            }
            if let Ok(liquid) = self.liquid_of_mut(&pending.validator) {
                liquid.set_commission_rate(pending.rate);
            }
            info!(validator = %pending.validator, rate = pending.rate, "commission rate applied");
            applied.push((pending.validator, pending.rate));
        }
        applied
    }
}

fn require_treasury(validator: &Validator, caller: Address) -> Result<(), NacreError> {
    if validator.treasury != caller {
        return Err(NacreError::Validation(format!(
            "caller {} is not the treasury of validator {}",
            caller, validator.address
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacre_core::crypto::Keypair;

    fn register_one(registry: &mut Registry, treasury: Address) -> Address {
        let node = Keypair::generate();
        let oracle = Keypair::generate();
        let proof = RegistrationProof {
            node_key: node.public_key_bytes(),
            oracle_key: oracle.public_key_bytes(),
            node_signature: node.sign(treasury.as_bytes()),
            oracle_signature: oracle.sign(treasury.as_bytes()),
        };
        registry.register(treasury, &proof, 1_000, 5).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        let treasury = Address([7u8; 20]);
        let address = register_one(&mut registry, treasury);

        let record = registry.get(&address).unwrap();
        assert_eq!(record.treasury, treasury);
        assert_eq!(record.state, ValidatorState::Active);
        assert_eq!(record.registration_block, 5);
        assert_eq!(registry.liquid_of(&address).unwrap().supply(), 0);
    }

    #[test]
    fn test_register_rejects_bad_proof() {
        let mut registry = Registry::new();
        let treasury = Address([7u8; 20]);
        let node = Keypair::generate();
        let oracle = Keypair::generate();
        // Oracle signature covers the wrong message.
        let proof = RegistrationProof {
            node_key: node.public_key_bytes(),
            oracle_key: oracle.public_key_bytes(),
            node_signature: node.sign(treasury.as_bytes()),
            oracle_signature: oracle.sign(b"not the treasury"),
        };
        assert!(matches!(
            registry.register(treasury, &proof, 1_000, 0),
            Err(NacreError::Crypto(_))
        ));
    }

    #[test]
    fn test_pause_requires_treasury_caller() {
        let mut registry = Registry::new();
        let treasury = Address([7u8; 20]);
        let address = register_one(&mut registry, treasury);

        let stranger = Address([8u8; 20]);
        assert!(matches!(
            registry.pause(stranger, address),
            Err(NacreError::Validation(_))
        ));
        registry.pause(treasury, address).unwrap();
        assert_eq!(registry.get(&address).unwrap().state, ValidatorState::Paused);
    }

    #[test]
    fn test_commission_rate_applies_after_effective_block() {
        let mut registry = Registry::new();
        let treasury = Address([7u8; 20]);
        let address = register_one(&mut registry, treasury);

        registry
            .change_commission_rate(treasury, address, 2_500, 100)
            .unwrap();
        assert!(registry.apply_pending_rates(99).is_empty());
        assert_eq!(registry.get(&address).unwrap().commission_rate, 1_000);

        let applied = registry.apply_pending_rates(100);
        assert_eq!(applied, vec![(address, 2_500)]);
        assert_eq!(registry.get(&address).unwrap().commission_rate, 2_500);
        assert_eq!(registry.liquid_of(&address).unwrap().commission_rate(), 2_500);
    }

    #[test]
    fn test_commission_rate_above_precision_rejected() {
        let mut registry = Registry::new();
        let treasury = Address([7u8; 20]);
        let address = register_one(&mut registry, treasury);
        assert!(registry
            .change_commission_rate(treasury, address, RATE_PRECISION + 1, 0)
            .is_err());
    }
}
