// crates/nacre-economics/src/lib.rs
//
// nacre-economics: base-token accounting, per-validator liquid share
// ledgers with pull-based reward accrual, the global treasury, and the
// reward split arithmetic for the Nacre staking ledger.
//
// All monetary values are integer atto amounts; there is no floating
// point anywhere in the economic path.

pub mod liquid;
pub mod rewards;
pub mod token;
pub mod treasury;

// Re-export key types for ergonomic access from downstream crates.
pub use liquid::{HolderAccount, LiquidLedger};
pub use rewards::{split_member_reward, split_pool, RewardSplit};
pub use token::AccountLedger;
pub use treasury::Treasury;
