// crates/nacre-core/src/fault.rs
//
// Canonical accountability types: fault rules, severity tiers, and the
// submitted event record. The state machine that consumes these lives in
// nacre-accountability.

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// Severity tier of a fault. Ordered: a higher tier both slashes harder
/// and supersedes lower-tier claims for the same offence epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Mid,
    High,
}

/// Protocol rules a validator can be accused of breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rule {
    /// Voted for conflicting values at the same height and round.
    Equivocation,
    /// Proposed a block that fails protocol validity checks.
    InvalidProposal,
    /// Cast a vote that contradicts its own prior locked value.
    InvalidVote,
    /// Withheld votes over a sustained window.
    VoteOmission,
}

impl Rule {
    /// Severity tier of the rule.
    pub fn severity(&self) -> Severity {
        match self {
            Rule::Equivocation => Severity::High,
            Rule::InvalidProposal => Severity::Mid,
            Rule::InvalidVote => Severity::Mid,
            Rule::VoteOmission => Severity::Low,
        }
    }
}

/// Kind of a submitted accountability event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Provisional claim; slashable only if not rebutted within the
    /// innocence window.
    Accusation,
    /// Directly slashable proof of misbehavior.
    FaultProof,
    /// Rebuttal of an outstanding accusation.
    InnocenceProof,
}

/// A submitted accountability event, as recorded in the event arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountabilityEvent {
    pub kind: EventKind,
    pub offender: Address,
    pub reporter: Address,
    pub rule: Rule,
    /// Block at which the offence occurred.
    pub reference_block: u64,
    /// Block at which the event was submitted.
    pub reporting_block: u64,
    /// Epoch the offence falls in.
    pub epoch: u64,
    /// Raw proof blob. Opaque to the ledger; verified upstream by the
    /// consensus engine before submission.
    pub proof: Vec<u8>,
}

impl AccountabilityEvent {
    pub fn severity(&self) -> Severity {
        self.rule.severity()
    }
}
