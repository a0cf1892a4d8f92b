// crates/nacre-economics/src/liquid.rs
//
// Per-validator liquid share ledger (LNTN): fungible receipt tokens for
// delegated stake, with pull-based reward accrual.
//
// Rewards accrue through a global per-share accumulator (`fee_factor`, in
// FEE_FACTOR_UNIT fixed point). Every balance change checkpoints the
// holder first, folding the pending accrual into `realised` and advancing
// the holder's snapshot, so a holder's reward share always reflects the
// balance held when the reward was distributed, not the current balance.
//
// The share supply is fixed with respect to slashing: slashed delegated
// stake shrinks the backing pool on the validator record, never the
// share balances here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nacre_core::{Address, Amount, NacreError, FEE_FACTOR_UNIT, RATE_PRECISION};

/// Per-holder share account.
///
/// `factor_snapshot` is the value of the ledger's `fee_factor` at the
/// holder's last checkpoint; rewards accrued since then are pending and
/// fold into `realised` at the next checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HolderAccount {
    pub balance: Amount,
    /// Shares locked during unbonding. Cannot be transferred or burned.
    pub locked: Amount,
    /// Realised but unclaimed rewards, in atto of the fee currency.
    pub realised: Amount,
    pub factor_snapshot: Amount,
}

impl HolderAccount {
    fn unlocked(&self) -> Amount {
        self.balance - self.locked
    }

    /// Fold pending accrual into `realised` and advance the snapshot.
    fn checkpoint(&mut self, fee_factor: Amount) {
        let pending = self.balance * (fee_factor - self.factor_snapshot) / FEE_FACTOR_UNIT;
        self.realised += pending;
        self.factor_snapshot = fee_factor;
    }
}

/// The liquid share ledger of a single validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidLedger {
    validator: Address,
    /// Commission rate against RATE_PRECISION, deducted from each
    /// redistribution before accrual.
    commission_rate: u64,
    supply: Amount,
    holders: BTreeMap<Address, HolderAccount>,
    /// Cumulative per-share accrual, FEE_FACTOR_UNIT fixed point.
    fee_factor: Amount,
    /// Delegator reward value deposited and not yet claimed. Sub-share
    /// rounding dust stays here permanently.
    reward_pot: Amount,
}

impl LiquidLedger {
    pub fn new(validator: Address, commission_rate: u64) -> Self {
        Self {
            validator,
            commission_rate,
            supply: 0,
            holders: BTreeMap::new(),
            fee_factor: 0,
            reward_pot: 0,
        }
    }

    pub fn validator(&self) -> Address {
        self.validator
    }

    pub fn supply(&self) -> Amount {
        self.supply
    }

    pub fn commission_rate(&self) -> u64 {
        self.commission_rate
    }

    /// Applied at epoch boundaries by the deferred commission-rate queue.
    pub fn set_commission_rate(&mut self, rate: u64) {
        self.commission_rate = rate;
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.holders.get(holder).map(|h| h.balance).unwrap_or(0)
    }

    pub fn locked_balance_of(&self, holder: &Address) -> Amount {
        self.holders.get(holder).map(|h| h.locked).unwrap_or(0)
    }

    /// Delegator reward value retained and not yet claimed.
    pub fn reward_pot(&self) -> Amount {
        self.reward_pot
    }

    /// Mint `amount` shares to `holder`.
    pub fn mint(&mut self, holder: Address, amount: Amount) {
        let fee_factor = self.fee_factor;
        let account = self.holders.entry(holder).or_default();
        account.checkpoint(fee_factor);
        account.balance += amount;
        self.supply += amount;
    }

    /// Burn `amount` unlocked shares from `holder`.
    ///
    /// # Errors
    /// `NacreError::InsufficientUnlocked` if `amount` exceeds the
    /// holder's unlocked balance.
    pub fn burn(&mut self, holder: Address, amount: Amount) -> Result<(), NacreError> {
        let fee_factor = self.fee_factor;
        let account = self.holders.entry(holder).or_default();
        if account.unlocked() < amount {
            return Err(NacreError::InsufficientUnlocked {
                available: account.unlocked(),
                requested: amount,
            });
        }
        account.checkpoint(fee_factor);
        account.balance -= amount;
        self.supply -= amount;
        Ok(())
    }

    /// Transfer `amount` unlocked shares. Both parties are checkpointed
    /// before balances change.
    ///
    /// # Errors
    /// `NacreError::InsufficientUnlocked` if `amount` exceeds the
    /// sender's unlocked balance.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        let fee_factor = self.fee_factor;
        {
            let sender = self.holders.entry(from).or_default();
            if sender.unlocked() < amount {
                return Err(NacreError::InsufficientUnlocked {
                    available: sender.unlocked(),
                    requested: amount,
                });
            }
            sender.checkpoint(fee_factor);
            sender.balance -= amount;
        }
        let receiver = self.holders.entry(to).or_default();
        receiver.checkpoint(fee_factor);
        receiver.balance += amount;
        Ok(())
    }

    /// Lock `amount` of the holder's shares (unbond enqueue).
    ///
    /// # Errors
    /// `NacreError::LockExceedsBalance` if `amount` exceeds the unlocked
    /// balance.
    pub fn lock(&mut self, holder: Address, amount: Amount) -> Result<(), NacreError> {
        let account = self.holders.entry(holder).or_default();
        if account.unlocked() < amount {
            return Err(NacreError::LockExceedsBalance {
                available: account.unlocked(),
                requested: amount,
            });
        }
        account.locked += amount;
        Ok(())
    }

    /// Unlock `amount` previously locked shares.
    ///
    /// # Errors
    /// `NacreError::UnlockExceedsLocked` if `amount` exceeds the locked
    /// balance.
    pub fn unlock(&mut self, holder: Address, amount: Amount) -> Result<(), NacreError> {
        let account = self.holders.entry(holder).or_default();
        if account.locked < amount {
            return Err(NacreError::UnlockExceedsLocked {
                available: account.locked,
                requested: amount,
            });
        }
        account.locked -= amount;
        Ok(())
    }

    /// Distribute `amount` of reward value across current share holders.
    ///
    /// The commission cut comes off the top and is returned to the caller
    /// for routing to the validator's treasury; the remainder raises the
    /// per-share accumulator. Value below one accrual tick across the
    /// supply stays in the pot as retained dust. With no shares
    /// outstanding the whole amount is returned as commission.
    pub fn redistribute(&mut self, amount: Amount) -> Amount {
        let commission = amount * self.commission_rate as Amount / RATE_PRECISION as Amount;
        let delegated = amount - commission;
        if self.supply == 0 {
            return amount;
        }
        self.fee_factor += delegated * FEE_FACTOR_UNIT / self.supply;
        self.reward_pot += delegated;
        commission
    }

    /// Rewards accrued to `holder` and not yet claimed.
    pub fn unclaimed_rewards(&self, holder: &Address) -> Amount {
        match self.holders.get(holder) {
            Some(account) => {
                account.realised
                    + account.balance * (self.fee_factor - account.factor_snapshot)
                        / FEE_FACTOR_UNIT
            }
            None => 0,
        }
    }

    /// Pay out and reset the holder's unclaimed rewards. Never pays twice
    /// for the same accrual tick: claiming checkpoints the holder, so a
    /// second claim before further redistribution returns zero.
    pub fn claim_rewards(&mut self, holder: Address) -> Amount {
        let fee_factor = self.fee_factor;
        let account = self.holders.entry(holder).or_default();
        account.checkpoint(fee_factor);
        let amount = account.realised;
        account.realised = 0;
        self.reward_pot -= amount;
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Address {
        Address([9u8; 20])
    }

    fn alice() -> Address {
        Address([1u8; 20])
    }

    fn bob() -> Address {
        Address([2u8; 20])
    }

    fn ledger_with_commission(rate: u64) -> LiquidLedger {
        LiquidLedger::new(validator(), rate)
    }

    #[test]
    fn test_mint_burn_supply() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 100);
        liquid.mint(bob(), 50);
        assert_eq!(liquid.supply(), 150);
        liquid.burn(alice(), 40).unwrap();
        assert_eq!(liquid.supply(), 110);
        assert_eq!(liquid.balance_of(&alice()), 60);
    }

    #[test]
    fn test_locked_shares_cannot_burn_or_transfer() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 100);
        liquid.lock(alice(), 70).unwrap();
        assert!(matches!(
            liquid.burn(alice(), 31),
            Err(NacreError::InsufficientUnlocked { .. })
        ));
        assert!(matches!(
            liquid.transfer(alice(), bob(), 31),
            Err(NacreError::InsufficientUnlocked { .. })
        ));
        // Exactly the unlocked remainder is fine.
        liquid.burn(alice(), 30).unwrap();
    }

    #[test]
    fn test_lock_unlock_bounds() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 100);
        assert!(matches!(
            liquid.lock(alice(), 101),
            Err(NacreError::LockExceedsBalance { .. })
        ));
        liquid.lock(alice(), 100).unwrap();
        assert!(matches!(
            liquid.unlock(alice(), 101),
            Err(NacreError::UnlockExceedsLocked { .. })
        ));
        liquid.unlock(alice(), 100).unwrap();
    }

    #[test]
    fn test_redistribute_pro_rata() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 75);
        liquid.mint(bob(), 25);
        let commission = liquid.redistribute(1_000);
        assert_eq!(commission, 0);
        assert_eq!(liquid.unclaimed_rewards(&alice()), 750);
        assert_eq!(liquid.unclaimed_rewards(&bob()), 250);
    }

    #[test]
    fn test_redistribute_deducts_commission() {
        // 20% commission.
        let mut liquid = ledger_with_commission(2_000);
        liquid.mint(alice(), 100);
        let commission = liquid.redistribute(1_000);
        assert_eq!(commission, 200);
        assert_eq!(liquid.unclaimed_rewards(&alice()), 800);
    }

    #[test]
    fn test_redistribute_without_supply_returns_all() {
        let mut liquid = ledger_with_commission(1_000);
        assert_eq!(liquid.redistribute(500), 500);
    }

    #[test]
    fn test_claim_pays_once() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 10);
        liquid.redistribute(100);
        assert_eq!(liquid.claim_rewards(alice()), 100);
        assert_eq!(liquid.claim_rewards(alice()), 0);
        liquid.redistribute(50);
        assert_eq!(liquid.claim_rewards(alice()), 50);
    }

    #[test]
    fn test_transfer_checkpoints_both_parties() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 100);
        liquid.redistribute(1_000);

        // Bob acquires the full balance after the distribution; the
        // earlier reward stays with Alice.
        liquid.transfer(alice(), bob(), 100).unwrap();
        assert_eq!(liquid.unclaimed_rewards(&alice()), 1_000);
        assert_eq!(liquid.unclaimed_rewards(&bob()), 0);

        liquid.redistribute(500);
        assert_eq!(liquid.unclaimed_rewards(&alice()), 1_000);
        assert_eq!(liquid.unclaimed_rewards(&bob()), 500);
    }

    #[test]
    fn test_accrual_dust_retained_in_pot() {
        let mut liquid = ledger_with_commission(0);
        liquid.mint(alice(), 3);
        liquid.mint(bob(), 4);
        // 10 then 11 over 7 shares: the per-share factor floors, so a few
        // atto stay behind in the pot. Claims never exceed deposits.
        liquid.redistribute(10);
        liquid.redistribute(11);
        let claimed = liquid.claim_rewards(alice()) + liquid.claim_rewards(bob());
        assert!(claimed <= 21);
        assert_eq!(liquid.reward_pot(), 21 - claimed);
        // Claimed plus retained dust accounts for every atto deposited.
        assert_eq!(claimed + liquid.reward_pot(), 21);
    }
}
