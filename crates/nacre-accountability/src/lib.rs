// crates/nacre-accountability/src/lib.rs
//
// nacre-accountability: the fault accusation lifecycle and the layered
// slashing engine of the Nacre staking ledger.

pub mod machine;
pub mod slashing;

pub use machine::Accountability;
pub use slashing::{slash, slashing_rate, SlashOutcome};
