// crates/nacre-ledger/src/lib.rs
//
// nacre-ledger: the top-level staking ledger of the Nacre protocol. One
// state machine ties together the token books, the validator registry,
// the bonding/unbonding queues, the accountability machine, and the
// committee, and exposes the external call surface a consensus engine
// drives block by block.

pub mod ledger;
pub mod snapshot;

pub use ledger::{GenesisValidator, StakingLedger};
