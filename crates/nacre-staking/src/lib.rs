// crates/nacre-staking/src/lib.rs
//
// nacre-staking: the validator registry and the bonding/unbonding
// queues of the Nacre staking ledger. Enqueue operations validate
// eagerly; epoch-boundary application is infallible by construction.

pub mod bonding;
pub mod registry;

pub use bonding::{BondingQueue, UnbondingQueue};
pub use registry::Registry;
