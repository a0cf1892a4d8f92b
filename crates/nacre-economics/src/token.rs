// crates/nacre-economics/src/token.rs
//
// Base-token account book. Two instances back the ledger: one for the
// stake token (NTN) and one for the fee currency rewards are paid in.
// Bonding debits a delegator's account here; stake then lives in the
// validator record until an unbonding release credits it back.
//
// Balances use a BTreeMap so iteration order, and therefore any derived
// state, is identical across nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nacre_core::{Address, Amount, NacreError};

/// A fungible token ledger with an ERC-20-style surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountLedger {
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl AccountLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` to `account`, growing the total supply.
    pub fn mint(&mut self, account: Address, amount: Amount) {
        *self.balances.entry(account).or_insert(0) += amount;
        self.total_supply += amount;
    }

    /// Burn `amount` from `account`, shrinking the total supply.
    ///
    /// # Errors
    /// `NacreError::InsufficientBalance` if the account holds less than
    /// `amount`.
    pub fn burn(&mut self, account: Address, amount: Amount) -> Result<(), NacreError> {
        self.debit(account, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    /// Move `amount` from `from` to `to`.
    ///
    /// # Errors
    /// `NacreError::InsufficientBalance` if `from` holds less than `amount`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Credit `amount` to `account` without touching the total supply.
    /// Used when stake re-enters circulation (unbonding release).
    pub fn credit(&mut self, account: Address, amount: Amount) {
        *self.balances.entry(account).or_insert(0) += amount;
    }

    /// Debit `amount` from `account` without touching the total supply.
    /// Used when stake leaves circulation (bonding).
    ///
    /// # Errors
    /// `NacreError::InsufficientBalance` if the account holds less than
    /// `amount`.
    pub fn debit(&mut self, account: Address, amount: Amount) -> Result<(), NacreError> {
        let balance = self.balances.entry(account).or_insert(0);
        if *balance < amount {
            return Err(NacreError::InsufficientBalance {
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Sum of all account balances. Lags `total_supply` by whatever stake
    /// is currently bonded or unbonding.
    pub fn circulating(&self) -> Amount {
        self.balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address([1u8; 20])
    }

    fn bob() -> Address {
        Address([2u8; 20])
    }

    #[test]
    fn test_mint_and_balance() {
        let mut ledger = AccountLedger::new();
        ledger.mint(alice(), 100);
        assert_eq!(ledger.balance_of(&alice()), 100);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_transfer() {
        let mut ledger = AccountLedger::new();
        ledger.mint(alice(), 100);
        ledger.transfer(alice(), bob(), 40).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 60);
        assert_eq!(ledger.balance_of(&bob()), 40);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = AccountLedger::new();
        ledger.mint(alice(), 10);
        let err = ledger.transfer(alice(), bob(), 11).unwrap_err();
        assert_eq!(
            err,
            NacreError::InsufficientBalance {
                available: 10,
                requested: 11
            }
        );
        // Nothing moved.
        assert_eq!(ledger.balance_of(&alice()), 10);
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn test_burn_adjusts_supply() {
        let mut ledger = AccountLedger::new();
        ledger.mint(alice(), 100);
        ledger.burn(alice(), 30).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 70);
        assert_eq!(ledger.total_supply(), 70);
    }

    #[test]
    fn test_debit_credit_leave_supply_untouched() {
        let mut ledger = AccountLedger::new();
        ledger.mint(alice(), 100);
        ledger.debit(alice(), 100).unwrap();
        assert_eq!(ledger.total_supply(), 100);
        ledger.credit(bob(), 100);
        assert_eq!(ledger.circulating(), 100);
    }
}
