// crates/nacre-staking/src/bonding.rs
//
// Bonding and unbonding queues, and their atomic epoch-boundary
// application.
//
// Requests live in append-only arenas indexed by id; each queue keeps
// explicit cursors over its arena. Everything that can be rejected is
// rejected at enqueue time (balance debits, share locks, self-bond
// availability), so the apply and release passes cannot fail mid-batch:
// an error out of the apply path means a broken invariant, not bad input.
//
// Stake conversions go through share ratios so that slashing between
// enqueue and application is priced in: liquid shares convert at the
// current delegated-stake ratio, unbonding shares redeem against a pool
// whose value only moves when it is slashed.

use serde::{Deserialize, Serialize};
use tracing::info;

use nacre_core::{Address, Amount, BondingRequest, NacreError, UnbondingRequest, Validator};
use nacre_economics::{AccountLedger, LiquidLedger};

use crate::registry::Registry;

/// FIFO queue of bonding requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BondingQueue {
    requests: Vec<BondingRequest>,
    /// Index of the first unapplied request.
    head: u64,
}

impl BondingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request, returning its id. The caller has already
    /// debited the delegator and validated the target validator.
    pub fn enqueue(&mut self, request: BondingRequest) -> u64 {
        self.requests.push(request);
        (self.requests.len() - 1) as u64
    }

    pub fn get(&self, id: u64) -> Option<&BondingRequest> {
        self.requests.get(id as usize)
    }

    /// Number of requests waiting for epoch application.
    pub fn pending(&self) -> u64 {
        self.requests.len() as u64 - self.head
    }

    /// Apply every pending request, in id order. Runs at the epoch
    /// boundary; infallible by construction.
    pub fn apply_pending(&mut self, registry: &mut Registry) -> Result<(), NacreError> {
        while (self.head as usize) < self.requests.len() {
            let request = &mut self.requests[self.head as usize];
            let (validator, liquid) = registry.record_mut(&request.delegatee)?;
            apply_bonding(validator, liquid, request);
            request.applied = true;
            self.head += 1;
        }
        Ok(())
    }
}

/// FIFO queue of unbonding requests, with separate cursors for the two
/// processing stages (application and release).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnbondingQueue {
    requests: Vec<UnbondingRequest>,
    /// Index of the first unapplied request.
    apply_head: u64,
    /// Index of the first unreleased request.
    release_head: u64,
}

impl UnbondingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: UnbondingRequest) -> u64 {
        self.requests.push(request);
        (self.requests.len() - 1) as u64
    }

    pub fn get(&self, id: u64) -> Option<&UnbondingRequest> {
        self.requests.get(id as usize)
    }

    pub fn pending(&self) -> u64 {
        self.requests.len() as u64 - self.apply_head
    }

    /// Apply every pending request: burn the locked liquid shares (or
    /// release the self-bond hold) and issue unbonding shares at the
    /// pool's current ratio.
    pub fn apply_pending(&mut self, registry: &mut Registry) -> Result<(), NacreError> {
        while (self.apply_head as usize) < self.requests.len() {
            let request = &mut self.requests[self.apply_head as usize];
            let (validator, liquid) = registry.record_mut(&request.delegatee)?;
            apply_unbonding(validator, liquid, request)?;
            request.applied = true;
            self.apply_head += 1;
        }
        Ok(())
    }

    /// Void the share claims of applied, unreleased requests whose pool
    /// was emptied by slashing. A pool slashed to zero value burns its
    /// outstanding shares; a claim recorded against the burned supply
    /// must not survive into a refilled pool, where it would redeem
    /// stake belonging to later unbonders. Runs after the slashing
    /// sweep and before new requests are applied, so every refill
    /// starts from a clean 0:0 pool.
    pub fn void_burned_shares(&mut self, registry: &Registry) -> Result<(), NacreError> {
        for index in (self.release_head as usize)..(self.apply_head as usize) {
            let request = &mut self.requests[index];
            if request.unbonding_shares == 0 {
                continue;
            }
            let validator = registry.get(&request.delegatee)?;
            let pool_shares = if request.self_bonded {
                validator.self_unbonding_shares
            } else {
                validator.unbonding_shares
            };
            if pool_shares == 0 {
                info!(
                    validator = %request.delegatee,
                    delegator = %request.delegator,
                    shares = %request.unbonding_shares,
                    "unbonding shares voided with burned pool"
                );
                request.unbonding_shares = 0;
            }
        }
        Ok(())
    }

    /// Release every applied request whose unbonding period has elapsed,
    /// redeeming its unbonding shares at the pool's current ratio and
    /// crediting the delegator's stake balance. Requests mature in id
    /// order, so the scan stops at the first immature one.
    pub fn release_matured(
        &mut self,
        registry: &mut Registry,
        token: &mut AccountLedger,
        current_block: u64,
        unbonding_period: u64,
    ) -> Result<(), NacreError> {
        while (self.release_head as usize) < self.requests.len() {
            let request = &mut self.requests[self.release_head as usize];
            if !request.applied || request.request_block + unbonding_period > current_block {
                break;
            }
            let validator = registry.get_mut(&request.delegatee)?;
            let stake = release_unbonding(validator, request);
            token.credit(request.delegator, stake);
            request.released = true;
            self.release_head += 1;
        }
        Ok(())
    }
}

/// Apply one bonding request to its validator.
fn apply_bonding(validator: &mut Validator, liquid: &mut LiquidLedger, request: &BondingRequest) {
    if request.self_bonded {
        validator.self_bonded_stake += request.amount;
        validator.bonded_stake += request.amount;
    } else {
        // Mint at the current delegated-stake ratio so delegators who
        // bonded before a slash are not diluted retroactively; 1:1 on an
        // empty pool.
        let delegated = validator.delegated_stake();
        let shares = if liquid.supply() == 0 || delegated == 0 {
            request.amount
        } else {
            request.amount * liquid.supply() / delegated
        };
        liquid.mint(request.delegator, shares);
        validator.bonded_stake += request.amount;
        validator.liquid_supply = liquid.supply();
    }
    info!(
        validator = %request.delegatee,
        delegator = %request.delegator,
        amount = %request.amount,
        self_bonded = request.self_bonded,
        "bonding applied"
    );
}

/// Apply one unbonding request, issuing unbonding shares.
fn apply_unbonding(
    validator: &mut Validator,
    liquid: &mut LiquidLedger,
    request: &mut UnbondingRequest,
) -> Result<(), NacreError> {
    if request.self_bonded {
        // Slashing since enqueue may have shrunk the self-bond below the
        // requested amount; unbond whatever remains.
        let amount = request.amount.min(validator.self_bonded_stake);
        let shares = if validator.self_unbonding_stake == 0 {
            amount
        } else {
            amount * validator.self_unbonding_shares / validator.self_unbonding_stake
        };
        validator.self_unbonding_stake += amount;
        validator.self_unbonding_shares += shares;
        validator.self_bonded_stake -= amount;
        validator.bonded_stake -= amount;
        validator.self_unbonding_stake_locked = validator
            .self_unbonding_stake_locked
            .saturating_sub(request.amount);
        request.unbonding_shares = shares;
    } else {
        // The shares were locked at enqueue time, so unlock + burn cannot
        // fail here.
        let supply = liquid.supply();
        let stake = if supply == 0 {
            0
        } else {
            request.amount * validator.delegated_stake() / supply
        };
        liquid.unlock(request.delegator, request.amount)?;
        liquid.burn(request.delegator, request.amount)?;
        let shares = if validator.unbonding_stake == 0 {
            stake
        } else {
            stake * validator.unbonding_shares / validator.unbonding_stake
        };
        validator.unbonding_stake += stake;
        validator.unbonding_shares += shares;
        validator.bonded_stake -= stake;
        validator.liquid_supply = liquid.supply();
        request.unbonding_shares = shares;
    }
    info!(
        validator = %request.delegatee,
        delegator = %request.delegator,
        shares = %request.unbonding_shares,
        self_bonded = request.self_bonded,
        "unbonding applied"
    );
    Ok(())
}

/// Redeem a released request's unbonding shares for stake at the pool's
/// current ratio. A pool emptied by a 100% slash redeems zero.
fn release_unbonding(validator: &mut Validator, request: &UnbondingRequest) -> Amount {
    let (pool_stake, pool_shares) = if request.self_bonded {
        (
            validator.self_unbonding_stake,
            validator.self_unbonding_shares,
        )
    } else {
        (validator.unbonding_stake, validator.unbonding_shares)
    };

    let stake = if pool_shares == 0 {
        0
    } else {
        request.unbonding_shares * pool_stake / pool_shares
    };
    let remaining_shares = pool_shares.saturating_sub(request.unbonding_shares);

    if request.self_bonded {
        validator.self_unbonding_stake -= stake;
        validator.self_unbonding_shares = remaining_shares;
    } else {
        validator.unbonding_stake -= stake;
        validator.unbonding_shares = remaining_shares;
    }
    stake
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacre_core::ValidatorState;

    fn validator_address() -> Address {
        Address([1u8; 20])
    }

    fn treasury() -> Address {
        Address([2u8; 20])
    }

    fn delegator() -> Address {
        Address([3u8; 20])
    }

    fn seeded_registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert_genesis(Validator {
            address: validator_address(),
            treasury: treasury(),
            oracle: Address([4u8; 20]),
            node_key: [0u8; 32],
            oracle_key: [0u8; 32],
            bonded_stake: 0,
            self_bonded_stake: 0,
            unbonding_stake: 0,
            unbonding_shares: 0,
            self_unbonding_stake: 0,
            self_unbonding_shares: 0,
            self_unbonding_stake_locked: 0,
            liquid_supply: 0,
            commission_rate: 0,
            total_slashed: 0,
            provable_fault_count: 0,
            jail_release_block: 0,
            registration_block: 0,
            state: ValidatorState::Active,
        });
        registry
    }

    fn bond_request(amount: Amount, self_bonded: bool) -> BondingRequest {
        BondingRequest {
            delegator: if self_bonded { treasury() } else { delegator() },
            delegatee: validator_address(),
            amount,
            self_bonded,
            request_block: 1,
            applied: false,
        }
    }

    fn unbond_request(amount: Amount, self_bonded: bool, block: u64) -> UnbondingRequest {
        UnbondingRequest {
            delegator: if self_bonded { treasury() } else { delegator() },
            delegatee: validator_address(),
            amount,
            self_bonded,
            request_block: block,
            unbonding_shares: 0,
            applied: false,
            released: false,
        }
    }

    #[test]
    fn test_delegated_bonding_mints_liquid_one_to_one_initially() {
        let mut registry = seeded_registry();
        let mut queue = BondingQueue::new();
        queue.enqueue(bond_request(100, false));
        queue.apply_pending(&mut registry).unwrap();

        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.bonded_stake, 100);
        assert_eq!(record.self_bonded_stake, 0);
        assert_eq!(record.liquid_supply, 100);
        assert_eq!(
            registry
                .liquid_of(&validator_address())
                .unwrap()
                .balance_of(&delegator()),
            100
        );
    }

    #[test]
    fn test_self_bonding_mints_no_liquid() {
        let mut registry = seeded_registry();
        let mut queue = BondingQueue::new();
        queue.enqueue(bond_request(100, true));
        queue.apply_pending(&mut registry).unwrap();

        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.bonded_stake, 100);
        assert_eq!(record.self_bonded_stake, 100);
        assert_eq!(registry.liquid_of(&validator_address()).unwrap().supply(), 0);
    }

    #[test]
    fn test_fifo_order_and_cursor() {
        let mut registry = seeded_registry();
        let mut queue = BondingQueue::new();
        let first = queue.enqueue(bond_request(10, false));
        let second = queue.enqueue(bond_request(20, false));
        assert_eq!((first, second), (0, 1));
        assert_eq!(queue.pending(), 2);
        queue.apply_pending(&mut registry).unwrap();
        assert_eq!(queue.pending(), 0);
        assert!(queue.get(0).unwrap().applied);
        assert!(queue.get(1).unwrap().applied);
    }

    #[test]
    fn test_unbond_round_trip_returns_same_stake() {
        let mut registry = seeded_registry();
        let mut token = AccountLedger::new();
        let mut bonding = BondingQueue::new();
        let mut unbonding = UnbondingQueue::new();

        bonding.enqueue(bond_request(100, false));
        bonding.apply_pending(&mut registry).unwrap();

        // Lock happens at the ledger layer; mirror it here.
        registry
            .liquid_of_mut(&validator_address())
            .unwrap()
            .lock(delegator(), 100)
            .unwrap();
        unbonding.enqueue(unbond_request(100, false, 10));
        unbonding.apply_pending(&mut registry).unwrap();

        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.bonded_stake, 0);
        assert_eq!(record.unbonding_stake, 100);
        assert_eq!(record.unbonding_shares, 100);

        // Not yet matured.
        unbonding
            .release_matured(&mut registry, &mut token, 59, 50)
            .unwrap();
        assert_eq!(token.balance_of(&delegator()), 0);

        unbonding
            .release_matured(&mut registry, &mut token, 60, 50)
            .unwrap();
        assert_eq!(token.balance_of(&delegator()), 100);
        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.unbonding_stake, 0);
        assert_eq!(record.unbonding_shares, 0);
    }

    #[test]
    fn test_self_unbonding_uses_separate_pool() {
        let mut registry = seeded_registry();
        let mut bonding = BondingQueue::new();
        let mut unbonding = UnbondingQueue::new();

        bonding.enqueue(bond_request(100, true));
        bonding.apply_pending(&mut registry).unwrap();

        registry
            .get_mut(&validator_address())
            .unwrap()
            .self_unbonding_stake_locked = 40;
        unbonding.enqueue(unbond_request(40, true, 10));
        unbonding.apply_pending(&mut registry).unwrap();

        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.self_bonded_stake, 60);
        assert_eq!(record.bonded_stake, 60);
        assert_eq!(record.self_unbonding_stake, 40);
        assert_eq!(record.self_unbonding_shares, 40);
        assert_eq!(record.self_unbonding_stake_locked, 0);
        assert_eq!(record.unbonding_stake, 0);
    }

    #[test]
    fn test_release_after_pool_burn_and_refill_redeems_zero() {
        let mut registry = seeded_registry();
        let mut token = AccountLedger::new();
        let mut bonding = BondingQueue::new();
        let mut unbonding = UnbondingQueue::new();

        bonding.enqueue(bond_request(150, true));
        bonding.apply_pending(&mut registry).unwrap();

        registry
            .get_mut(&validator_address())
            .unwrap()
            .self_unbonding_stake_locked = 100;
        unbonding.enqueue(unbond_request(100, true, 10));
        unbonding.apply_pending(&mut registry).unwrap();

        // Slash the whole self-unbonding pool: value and shares burn
        // together, as the sweep does.
        {
            let record = registry.get_mut(&validator_address()).unwrap();
            record.self_unbonding_stake = 0;
            record.self_unbonding_shares = 0;
        }
        unbonding.void_burned_shares(&registry).unwrap();
        assert_eq!(unbonding.get(0).unwrap().unbonding_shares, 0);

        // A later self-unbond refills the pool at 1:1; the burned claim
        // must not redeem against it.
        registry
            .get_mut(&validator_address())
            .unwrap()
            .self_unbonding_stake_locked = 50;
        unbonding.enqueue(unbond_request(50, true, 20));
        unbonding.apply_pending(&mut registry).unwrap();

        unbonding
            .release_matured(&mut registry, &mut token, 100, 50)
            .unwrap();
        assert_eq!(token.balance_of(&treasury()), 50);
        let record = registry.get(&validator_address()).unwrap();
        assert_eq!(record.self_unbonding_stake, 0);
        assert_eq!(record.self_unbonding_shares, 0);
    }

    #[test]
    fn test_release_from_slashed_pool_redeems_less() {
        let mut registry = seeded_registry();
        let mut token = AccountLedger::new();
        let mut bonding = BondingQueue::new();
        let mut unbonding = UnbondingQueue::new();

        bonding.enqueue(bond_request(100, false));
        bonding.apply_pending(&mut registry).unwrap();
        registry
            .liquid_of_mut(&validator_address())
            .unwrap()
            .lock(delegator(), 100)
            .unwrap();
        unbonding.enqueue(unbond_request(100, false, 10));
        unbonding.apply_pending(&mut registry).unwrap();

        // Slash half the unbonding pool: shares fixed, value shrinks.
        let record = registry.get_mut(&validator_address()).unwrap();
        record.unbonding_stake = 50;

        unbonding
            .release_matured(&mut registry, &mut token, 100, 50)
            .unwrap();
        assert_eq!(token.balance_of(&delegator()), 50);
    }
}
