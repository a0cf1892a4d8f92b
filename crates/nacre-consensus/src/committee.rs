// crates/nacre-consensus/src/committee.rs
//
// Deterministic stake-weighted committee selection and proposer
// sampling.
//
// Once per epoch the committee is the top-N active validators by bonded
// stake, ties broken by ascending address bytes; it is immutable until
// the next epoch boundary. Proposer selection samples the committee
// weighted by voting power from a SHA-256 seed over (epoch, height,
// round), so every node picks the same proposer without communication.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use nacre_core::{Address, Amount, Validator, ValidatorState};

/// One committee seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub address: Address,
    /// Bonded stake at selection time.
    pub voting_power: Amount,
}

/// The epoch's committee, ordered by descending voting power.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Committee {
    pub members: Vec<CommitteeMember>,
    pub total_power: Amount,
}

impl Committee {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.iter().any(|m| m.address == *address)
    }
}

/// Select the committee from the validator set.
///
/// Eligible validators are active with non-zero bonded stake. The top
/// `max_size` by bonded stake are seated; the ordering (and therefore the
/// cut at `max_size`) is total, so every node derives the same committee.
pub fn compute_committee<'a, I>(validators: I, max_size: usize) -> Committee
where
    I: Iterator<Item = &'a Validator>,
{
    let mut eligible: Vec<(Address, Amount)> = validators
        .filter(|v| v.state == ValidatorState::Active && v.bonded_stake > 0)
        .map(|v| (v.address, v.bonded_stake))
        .collect();

    eligible.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    eligible.truncate(max_size);

    let total_power = eligible.iter().map(|(_, power)| power).sum();
    Committee {
        members: eligible
            .into_iter()
            .map(|(address, voting_power)| CommitteeMember {
                address,
                voting_power,
            })
            .collect(),
        total_power,
    }
}

/// Sample the proposer for (height, round), weighted by voting power.
///
/// Returns `None` for an empty committee.
pub fn select_proposer(
    committee: &Committee,
    epoch: u64,
    height: u64,
    round: u64,
) -> Option<Address> {
    if committee.total_power == 0 {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(b"nacre-proposer");
    hasher.update(epoch.to_be_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update(round.to_be_bytes());
    let digest = hasher.finalize();

    let mut seed_bytes = [0u8; 16];
    seed_bytes.copy_from_slice(&digest[..16]);
    let mut ticket = u128::from_be_bytes(seed_bytes) % committee.total_power;

    for member in &committee.members {
        if ticket < member.voting_power {
            return Some(member.address);
        }
        ticket -= member.voting_power;
    }
    // Unreachable: the ticket is strictly below the power sum.
    None
}
