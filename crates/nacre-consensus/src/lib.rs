// crates/nacre-consensus/src/lib.rs
//
// nacre-consensus: deterministic committee selection, stake-weighted
// proposer sampling, and epoch bookkeeping for the Nacre staking ledger.

pub mod committee;
pub mod epoch;

pub use committee::{compute_committee, select_proposer, Committee, CommitteeMember};
pub use epoch::EpochManager;
