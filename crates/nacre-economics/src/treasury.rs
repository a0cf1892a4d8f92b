// crates/nacre-economics/src/treasury.rs
//
// Global protocol treasury.
//
// The treasury receives:
//   - the treasury fee cut of every block reward pool (fee currency)
//   - all slashed stake (stake token)
//
// Spending the treasury is a governance concern outside this ledger;
// withdrawal is exposed for the governance caller.

use serde::{Deserialize, Serialize};

use nacre_core::{Amount, NacreError};

/// The global treasury. Tracks both currencies the ledger moves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Treasury {
    /// Slashed stake, in atto of the stake token.
    stake_balance: Amount,
    /// Accumulated treasury fees, in atto of the fee currency.
    fee_balance: Amount,
}

impl Treasury {
    /// Create a new treasury with zero balances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit slashed stake.
    pub fn deposit_stake(&mut self, amount: Amount) {
        self.stake_balance += amount;
    }

    /// Deposit a treasury fee.
    pub fn deposit_fee(&mut self, amount: Amount) {
        self.fee_balance += amount;
    }

    /// Withdraw from the slashed-stake balance.
    ///
    /// # Errors
    /// `NacreError::InsufficientBalance` if the balance is too low.
    pub fn withdraw_stake(&mut self, amount: Amount) -> Result<(), NacreError> {
        if amount > self.stake_balance {
            return Err(NacreError::InsufficientBalance {
                available: self.stake_balance,
                requested: amount,
            });
        }
        self.stake_balance -= amount;
        Ok(())
    }

    /// Withdraw from the fee balance.
    ///
    /// # Errors
    /// `NacreError::InsufficientBalance` if the balance is too low.
    pub fn withdraw_fee(&mut self, amount: Amount) -> Result<(), NacreError> {
        if amount > self.fee_balance {
            return Err(NacreError::InsufficientBalance {
                available: self.fee_balance,
                requested: amount,
            });
        }
        self.fee_balance -= amount;
        Ok(())
    }

    pub fn stake_balance(&self) -> Amount {
        self.stake_balance
    }

    pub fn fee_balance(&self) -> Amount {
        self.fee_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_treasury_is_empty() {
        let treasury = Treasury::new();
        assert_eq!(treasury.stake_balance(), 0);
        assert_eq!(treasury.fee_balance(), 0);
    }

    #[test]
    fn test_deposits_are_independent() {
        let mut treasury = Treasury::new();
        treasury.deposit_stake(100);
        treasury.deposit_fee(30);
        assert_eq!(treasury.stake_balance(), 100);
        assert_eq!(treasury.fee_balance(), 30);
    }

    #[test]
    fn test_withdraw_success_and_bounds() {
        let mut treasury = Treasury::new();
        treasury.deposit_stake(50);
        assert!(treasury.withdraw_stake(50).is_ok());
        assert_eq!(treasury.stake_balance(), 0);

        treasury.deposit_fee(10);
        let err = treasury.withdraw_fee(11).unwrap_err();
        assert!(matches!(err, NacreError::InsufficientBalance { .. }));
        // Balance unchanged after the rejected withdrawal.
        assert_eq!(treasury.fee_balance(), 10);
    }
}
